//! Protocol constants shared by the client and the tool server

/// Port the tool server listens on, and the local port every tunnel exposes
pub const DEFAULT_PORT: u16 = 3000;

/// Tool server endpoints
pub const START_TUNNEL_PATH: &str = "/start-tunnel";
pub const STOP_TUNNEL_PATH: &str = "/stop-tunnel";
pub const FILES_PATH: &str = "/files";
pub const DOWNLOAD_PATH: &str = "/download";
pub const WEBTEST_PATH: &str = "/webtest";
pub const HEALTH_PATH: &str = "/health";

/// Response header carrying the JSON-encoded `FileMetadata` of a download
pub const FILE_METADATA_HEADER: &str = "X-File-Metadata";

/// Response header carrying the hex SHA-256 of a download
pub const FILE_HASH_HEADER: &str = "X-File-Hash";

/// Default wait for a tunnel tool to print its public URL (seconds)
pub const DEFAULT_START_TIMEOUT_SECS: u64 = 10;

/// Hostname suffix of anonymity-network addresses
pub const ONION_SUFFIX: &str = ".onion";
