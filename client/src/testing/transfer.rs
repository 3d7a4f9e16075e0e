//! File transfer verification
//!
//! Downloads one catalogued file through the tunnel with `curl`, hashes the
//! bytes that landed on disk and compares them against the server's
//! metadata. Every failure degrades to a complete [`FileTransferResult`];
//! nothing escapes as an error.

use crate::parsers::{Curl, OutputParser, CURL_WRITE_OUT};
use protocol::digest::sha256_hex;
use protocol::results::{CurlResult, FileMetadata, FileTransferResult, TransferOutcome};
use protocol::{CommandRunner, DOWNLOAD_PATH, FILE_METADATA_HEADER};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, warn};

pub struct FileTransferVerifier<R> {
    runner: R,
    max_time_sec: u64,
    temp_root: Option<PathBuf>,
}

/// A download that produced no usable bytes
struct Failure {
    stats: CurlResult,
    error: String,
}

impl Failure {
    fn new(stats: CurlResult, error: impl Into<String>) -> Self {
        Self {
            stats,
            error: error.into(),
        }
    }
}

impl<R: CommandRunner> FileTransferVerifier<R> {
    pub fn new(runner: R, max_time_sec: u64, temp_root: Option<PathBuf>) -> Self {
        Self {
            runner,
            max_time_sec,
            temp_root,
        }
    }

    /// Download `filename` from the tunnel at `base_url` and verify it
    pub async fn transfer(
        &self,
        base_url: &str,
        filename: &str,
        original: &FileMetadata,
    ) -> FileTransferResult {
        let url = format!("{}{}/{}", base_url.trim_end_matches('/'), DOWNLOAD_PATH, filename);

        // The directory and everything in it is removed when `scratch` drops,
        // on every path out of this function
        let scratch = match self.scratch_dir() {
            Ok(dir) => dir,
            Err(e) => {
                let error = format!("Failed to create temporary directory: {}", e);
                return FileTransferResult::failed(filename, original.clone(), CurlResult::failed(&error), error);
            }
        };

        let result = match self.download(&url, filename, scratch.path()).await {
            Ok(outcome) => FileTransferResult::new(filename, original.clone(), outcome),
            Err(failure) => {
                warn!("Transfer of {} failed: {}", filename, failure.error);
                FileTransferResult::failed(filename, original.clone(), failure.stats, failure.error)
            }
        };

        if let Err(e) = scratch.close() {
            debug!("Ignoring cleanup failure for {}: {}", filename, e);
        }

        if result.transfer_success() && !result.hash_match() {
            warn!(
                "Hash mismatch for {}: server {} client {}",
                filename,
                result.server_hash(),
                result.client_hash()
            );
        }
        result
    }

    fn scratch_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("tunnelbench-");
        match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }

    async fn download(&self, url: &str, filename: &str, dir: &Path) -> Result<TransferOutcome, Failure> {
        let body_path = dir.join("body");
        let header_path = dir.join("headers");

        let args = vec![
            "-s".to_string(),
            "--max-time".to_string(),
            self.max_time_sec.to_string(),
            "-o".to_string(),
            body_path.to_string_lossy().into_owned(),
            "-D".to_string(),
            header_path.to_string_lossy().into_owned(),
            "-w".to_string(),
            CURL_WRITE_OUT.to_string(),
            url.to_string(),
        ];

        let output = self
            .runner
            .run("curl", &args)
            .await
            .map_err(|e| Failure::new(CurlResult::failed(e.to_string()), e.to_string()))?;

        let stats = Curl.parse(&output);
        if !stats.is_http_success() {
            let error = format!("HTTP status {}", stats.status_code);
            return Err(Failure::new(stats.with_error(&error), error));
        }

        let bytes = tokio::fs::read(&body_path)
            .await
            .map_err(|e| Failure::new(stats.clone(), format!("Downloaded file unreadable: {}", e)))?;

        let hash_started = Instant::now();
        let client_hash = sha256_hex(&bytes);
        let hash_time_ms = hash_started.elapsed().as_secs_f64() * 1000.0;

        // The header dump is informational; a missing one leaves fields empty
        let headers = tokio::fs::read_to_string(&header_path).await.unwrap_or_default();
        let declared = header_value(&headers, FILE_METADATA_HEADER)
            .and_then(|v| serde_json::from_str::<FileMetadata>(&v).ok());

        let received = FileMetadata {
            filename: filename.to_string(),
            size: bytes.len() as u64,
            hash: client_hash,
            content_type: header_value(&headers, "Content-Type").unwrap_or_default(),
            timestamp: declared.map(|m| m.timestamp).unwrap_or_default(),
        };

        debug!("Downloaded {} ({} bytes, hashed in {:.2}ms)", filename, received.size, hash_time_ms);

        Ok(TransferOutcome {
            received,
            transfer_success: true,
            hash_time_ms,
            stats,
            error: None,
        })
    }
}

/// Last value of header `name` in a curl `-D` dump (case-insensitive)
fn header_value(dump: &str, name: &str) -> Option<String> {
    dump.lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim().to_string())
        .last()
}
