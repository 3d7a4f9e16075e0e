//! Result schema for benchmark runs
//!
//! All timings are in milliseconds, speeds in bytes per second and sizes in
//! bytes. Field names serialise in camelCase so the persisted JSON keeps the
//! layout downstream tooling expects.
//!
//! Derived fields (`ttfb`, `latency`, `hashMatch`, `sizeMatch`,
//! `metadataMatch`) are private and computed by the constructors, so they can
//! never disagree with the values they are derived from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Server-declared description of a test file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub filename: String,
    /// Size in bytes
    pub size: u64,
    /// Hex content digest
    pub hash: String,
    pub content_type: String,
    pub timestamp: String,
}

impl FileMetadata {
    /// Placeholder for a file that was never received
    pub fn empty(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            size: 0,
            hash: String::new(),
            content_type: String::new(),
            timestamp: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSplit {
    pub dns_lookup: f64,
    pub tcp_connection: f64,
    pub tls_handshake: f64,
    pub first_byte: f64,
    pub total: f64,
}

/// Timing and transfer statistics reported by one curl invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurlResult {
    pub status_code: u16,
    time_split: TimeSplit,
    ttfb: f64,
    latency: f64,
    pub size_download: u64,
    pub speed_download: f64,
    pub speed_upload: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CurlResult {
    pub fn new(
        status_code: u16,
        time_split: TimeSplit,
        size_download: u64,
        speed_download: f64,
        speed_upload: f64,
    ) -> Self {
        // ttfb is the sum of every phase up to the first byte, latency is
        // the connect phase alone
        let ttfb = time_split.dns_lookup
            + time_split.tcp_connection
            + time_split.tls_handshake
            + time_split.first_byte;
        Self {
            status_code,
            time_split,
            ttfb,
            latency: time_split.tcp_connection,
            size_download,
            speed_download,
            speed_upload,
            error: None,
        }
    }

    /// All-zero statistics carrying an error
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn time_split(&self) -> &TimeSplit {
        &self.time_split
    }

    pub fn ttfb(&self) -> f64 {
        self.ttfb
    }

    pub fn latency(&self) -> f64 {
        self.latency
    }

    pub fn is_http_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashMatchDetails {
    pub matched: bool,
    pub server_hash: String,
    pub client_hash: String,
    /// Time spent hashing the downloaded bytes (ms)
    pub time_taken: f64,
}

/// What the client observed for one download, before comparison
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Metadata of the bytes that landed on disk (`hash` is the client digest)
    pub received: FileMetadata,
    pub transfer_success: bool,
    pub hash_time_ms: f64,
    pub stats: CurlResult,
    pub error: Option<String>,
}

/// Verified result of downloading one file in one measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTransferResult {
    filename: String,
    timestamp: String,
    original_metadata: FileMetadata,
    received_metadata: FileMetadata,
    transfer_success: bool,
    hash_match: bool,
    size_match: bool,
    metadata_match: bool,
    server_hash: String,
    client_hash: String,
    hash_match_details: HashMatchDetails,
    transfer_stats: CurlResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl FileTransferResult {
    /// Compare what was received against the server's metadata
    ///
    /// Hash and size only count as matching when the transfer itself succeeded.
    pub fn new(filename: &str, original: FileMetadata, outcome: TransferOutcome) -> Self {
        let server_hash = original.hash.clone();
        let client_hash = outcome.received.hash.clone();
        let hash_match = outcome.transfer_success && server_hash == client_hash;
        let size_match = outcome.transfer_success && original.size == outcome.received.size;

        Self {
            filename: filename.to_string(),
            timestamp: now_rfc3339(),
            hash_match_details: HashMatchDetails {
                matched: hash_match,
                server_hash: server_hash.clone(),
                client_hash: client_hash.clone(),
                time_taken: outcome.hash_time_ms,
            },
            original_metadata: original,
            received_metadata: outcome.received,
            transfer_success: outcome.transfer_success,
            hash_match,
            size_match,
            metadata_match: hash_match && size_match,
            server_hash,
            client_hash,
            transfer_stats: outcome.stats,
            error: outcome.error,
        }
    }

    /// Complete record for a transfer that produced nothing usable
    pub fn failed(filename: &str, original: FileMetadata, stats: CurlResult, error: String) -> Self {
        Self::new(
            filename,
            original,
            TransferOutcome {
                received: FileMetadata::empty(filename),
                transfer_success: false,
                hash_time_ms: 0.0,
                stats,
                error: Some(error),
            },
        )
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn original_metadata(&self) -> &FileMetadata {
        &self.original_metadata
    }

    pub fn received_metadata(&self) -> &FileMetadata {
        &self.received_metadata
    }

    pub fn transfer_success(&self) -> bool {
        self.transfer_success
    }

    pub fn hash_match(&self) -> bool {
        self.hash_match
    }

    pub fn size_match(&self) -> bool {
        self.size_match
    }

    pub fn metadata_match(&self) -> bool {
        self.metadata_match
    }

    pub fn server_hash(&self) -> &str {
        &self.server_hash
    }

    pub fn client_hash(&self) -> &str {
        &self.client_hash
    }

    pub fn hash_match_details(&self) -> &HashMatchDetails {
        &self.hash_match_details
    }

    pub fn transfer_stats(&self) -> &CurlResult {
        &self.transfer_stats
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Downloaded, intact and the expected size
    pub fn is_complete(&self) -> bool {
        self.transfer_success && self.hash_match && self.metadata_match
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebTestResult {
    pub url: String,
    pub stats: CurlResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One cycle of file transfers plus a web test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// 1-based position in the measurement loop
    pub measurement_number: u32,
    pub timestamp: String,
    pub file_transfers: BTreeMap<String, FileTransferResult>,
    pub web_tests: Vec<WebTestResult>,
}

impl Measurement {
    pub fn new(measurement_number: u32) -> Self {
        Self {
            measurement_number,
            timestamp: now_rfc3339(),
            file_transfers: BTreeMap::new(),
            web_tests: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Milliseconds
    pub duration: f64,
}

impl Timing {
    pub fn from_duration(d: std::time::Duration) -> Self {
        Self {
            duration: d.as_secs_f64() * 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementDurations {
    pub total: Timing,
    pub average: Timing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Durations {
    pub total: Timing,
    pub tool_setup: Timing,
    pub diagnostics: Timing,
    pub measurements: MeasurementDurations,
}

/// A recoverable failure recorded against the stage it happened in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    pub packets_transmitted: u32,
    pub packets_received: u32,
    /// ICMP echo loss reported by ping itself
    pub icmp_packet_loss_pct: f64,
    pub min_ms: f64,
    /// Mean round-trip time
    pub latency_ms: f64,
    pub max_ms: f64,
    /// Round-trip mean deviation
    pub jitter_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigAnswer {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub ttl: u32,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigResult {
    pub answers: Vec<DigAnswer>,
    pub query_time: u32,
    pub server: String,
    pub when: String,
    pub rcvd_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpTracerouteHop {
    pub hop_number: u32,
    pub ip: String,
    /// Three probes; `None` for a probe that timed out
    pub rtt_ms: [Option<f64>; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpTracerouteResult {
    pub hops: Vec<TcpTracerouteHop>,
    pub destination: String,
    pub port: u16,
}

/// Parsed diagnostic payload, keyed by the tool that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum DiagnosticOutput {
    Ping(PingResult),
    Dig(DigResult),
    TcpTraceroute(TcpTracerouteResult),
    /// Output of a tool without a parser
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticResult {
    pub tool: String,
    pub raw_output: String,
    pub parsed_output: Option<DiagnosticOutput>,
    pub timing: Timing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiagnosticResult {
    /// Record for a diagnostic tool that could not be run
    pub fn failed(tool: &str, error: String) -> Self {
        Self {
            tool: tool.to_string(),
            raw_output: String::new(),
            parsed_output: None,
            timing: Timing::default(),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Terminal artifact of one orchestrator run for one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub tool: String,
    pub diagnostics: Vec<DiagnosticResult>,
    pub measurements: Vec<Measurement>,
    pub durations: Durations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcap_file_path: Option<String>,
    pub all_downloads_complete: bool,
    pub errors: Vec<StageError>,
    #[serde(default)]
    pub aggregates: BTreeMap<String, MetricStats>,
}

impl RunResult {
    pub fn file_transfers(&self) -> impl Iterator<Item = &FileTransferResult> {
        self.measurements
            .iter()
            .flat_map(|m| m.file_transfers.values())
    }

    pub fn errors_for_stage<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a StageError> {
        self.errors.iter().filter(move |e| e.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(size: u64, hash: &str) -> FileMetadata {
        FileMetadata {
            filename: "file_1MB".to_string(),
            size,
            hash: hash.to_string(),
            content_type: "application/octet-stream".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn outcome(size: u64, hash: &str, success: bool) -> TransferOutcome {
        TransferOutcome {
            received: metadata(size, hash),
            transfer_success: success,
            hash_time_ms: 1.5,
            stats: CurlResult::default(),
            error: None,
        }
    }

    #[test]
    fn test_curl_derived_fields() {
        let split = TimeSplit {
            dns_lookup: 1.25,
            tcp_connection: 10.5,
            tls_handshake: 20.0,
            first_byte: 33.0,
            total: 80.0,
        };
        let result = CurlResult::new(200, split, 1024, 2048.0, 0.0);
        assert_eq!(result.ttfb(), 1.25 + 10.5 + 20.0 + 33.0);
        assert_eq!(result.latency(), 10.5);
        assert!(result.is_http_success());
    }

    #[test]
    fn test_matching_transfer() {
        let r = FileTransferResult::new("file_1MB", metadata(10, "abc"), outcome(10, "abc", true));
        assert!(r.hash_match());
        assert!(r.size_match());
        assert!(r.metadata_match());
        assert!(r.is_complete());
        assert!(r.error().is_none());
        assert_eq!(r.hash_match_details().time_taken, 1.5);
    }

    #[test]
    fn test_metadata_match_requires_both() {
        let hash_only = FileTransferResult::new("f", metadata(10, "abc"), outcome(9, "abc", true));
        assert!(hash_only.hash_match());
        assert!(!hash_only.size_match());
        assert!(!hash_only.metadata_match());

        let size_only = FileTransferResult::new("f", metadata(10, "abc"), outcome(10, "abd", true));
        assert!(!size_only.hash_match());
        assert!(size_only.size_match());
        assert!(!size_only.metadata_match());
    }

    #[test]
    fn test_failed_transfer_never_matches() {
        // An empty file on the server must not "match" an empty download
        let r = FileTransferResult::failed(
            "empty",
            metadata(0, ""),
            CurlResult::failed("curl exited 7"),
            "connection refused".to_string(),
        );
        assert!(!r.transfer_success());
        assert!(!r.hash_match());
        assert!(!r.size_match());
        assert!(!r.metadata_match());
        assert_eq!(r.error(), Some("connection refused"));
        assert_eq!(r.received_metadata().size, 0);
    }

    #[test]
    fn test_schema_field_names() {
        let r = FileTransferResult::new("f", metadata(10, "abc"), outcome(10, "abc", true));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["metadataMatch"], true);
        assert_eq!(json["hashMatchDetails"]["serverHash"], "abc");
        assert_eq!(json["transferStats"]["timeSplit"]["dnsLookup"], 0.0);
        assert!(json.get("error").is_none());

        let diag = DiagnosticResult::failed("dig", "not installed".to_string());
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["rawOutput"], "");
        assert!(json["parsedOutput"].is_null());
    }

    #[test]
    fn test_diagnostic_output_is_tagged() {
        let out = DiagnosticOutput::Raw("hello".to_string());
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["kind"], "raw");
        assert_eq!(json["data"], "hello");
    }
}
