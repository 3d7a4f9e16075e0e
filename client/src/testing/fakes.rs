//! In-memory stand-ins for the command runner and the tool server

use super::ControlPlane;
use anyhow::Result;
use protocol::control::StartTunnelResponse;
use protocol::digest::sha256_hex;
use protocol::results::FileMetadata;
use protocol::{CommandError, CommandRunner};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RunnerState {
    /// Bytes served per filename
    files: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    /// Filenames whose download times out
    failing_downloads: HashSet<String>,
    calls: Vec<Vec<String>>,
}

/// Command runner whose `curl` writes canned bytes to the `-o` path
#[derive(Clone, Default)]
pub struct FakeRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl FakeRunner {
    pub fn serve(&self, filename: &str, bytes: &[u8]) {
        self.state.lock().unwrap().files.insert(filename.to_string(), bytes.to_vec());
    }

    /// Make every invocation of `program` exit with code 1
    pub fn fail(&self, program: &str) {
        self.state.lock().unwrap().failing.insert(program.to_string());
    }

    /// Make `curl` time out for URLs ending in `/<filename>`
    pub fn fail_download(&self, filename: &str) {
        self.state.lock().unwrap().failing_downloads.insert(filename.to_string());
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, program: &str) -> usize {
        self.calls().iter().filter(|c| c[0] == program).count()
    }

    fn respond(&self, command: &str, args: &[String]) -> Result<String, CommandError> {
        let mut state = self.state.lock().unwrap();
        let mut call = vec![command.to_string()];
        call.extend(args.iter().cloned());
        state.calls.push(call);

        if state.failing.contains(command) {
            return Err(CommandError::Failed {
                command: command.to_string(),
                code: Some(1),
                stderr: format!("{} failed", command),
            });
        }
        if command != "curl" {
            return Ok(format!("{} output", command));
        }

        let flag = |name: &str| {
            args.iter()
                .position(|a| a == name)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };
        let url = args.last().cloned().unwrap_or_default();
        let filename = url.rsplit('/').next().unwrap_or_default().to_string();
        if state.failing_downloads.contains(&filename) {
            return Err(CommandError::Failed {
                command: command.to_string(),
                code: Some(28),
                stderr: "curl: (28) Operation timed out".to_string(),
            });
        }
        let body = state.files.get(&filename).cloned();
        let status = if body.is_some() || filename == "webtest" { 200 } else { 404 };
        let body = body.unwrap_or_default();

        if let Some(out) = flag("-o").filter(|p| p != "/dev/null") {
            std::fs::write(out, &body).unwrap();
        }
        if let Some(headers) = flag("-D") {
            std::fs::write(
                headers,
                format!("HTTP/1.1 {} OK\r\nContent-Type: application/octet-stream\r\n\r\n", status),
            )
            .unwrap();
        }

        Ok(format!(
            "DNS Lookup: 0.001s\nTCP Connection: 0.010s\nTLS Handshake: 0.020s\n\
             Start Transfer: 0.030s\nTotal Time: 0.050s\nDownload Speed: 1000 bytes/sec\n\
             Upload Speed: 0 bytes/sec\nHTTP Code: {}\nSize of Download: {} bytes\n",
            status,
            body.len()
        ))
    }
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        command: &str,
        args: &[String],
    ) -> impl Future<Output = Result<String, CommandError>> + Send {
        std::future::ready(self.respond(command, args))
    }
}

/// Tool server double
#[derive(Default)]
pub struct FakeControl {
    pub url: Option<String>,
    pub files: Vec<FileMetadata>,
    pub catalog_fails: bool,
    pub started: Mutex<Vec<String>>,
    pub stopped: Mutex<Vec<String>>,
}

impl FakeControl {
    pub fn with_url(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::default()
        }
    }
}

impl ControlPlane for FakeControl {
    fn start_tunnel(&self, tool: &str) -> impl Future<Output = Result<StartTunnelResponse>> + Send {
        self.started.lock().unwrap().push(tool.to_string());
        let result = match &self.url {
            Some(url) => Ok(StartTunnelResponse {
                url: url.clone(),
                readiness_verified: true,
            }),
            None => Err(anyhow::anyhow!("Tunnel start timed out after 10s")),
        };
        std::future::ready(result)
    }

    fn stop_tunnel(&self, tool: &str) -> impl Future<Output = Result<String>> + Send {
        self.stopped.lock().unwrap().push(tool.to_string());
        // a start that failed leaves nothing running on the server
        let result = match &self.url {
            Some(_) => Ok(format!("{} stopped", tool)),
            None => Err(anyhow::anyhow!("No active tunnel")),
        };
        std::future::ready(result)
    }

    fn list_files(&self) -> impl Future<Output = Result<Vec<FileMetadata>>> + Send {
        let result = if self.catalog_fails {
            Err(anyhow::anyhow!("catalog unavailable"))
        } else {
            Ok(self.files.clone())
        };
        std::future::ready(result)
    }
}

/// Catalog entry describing `bytes`
pub fn metadata_for(filename: &str, bytes: &[u8]) -> FileMetadata {
    FileMetadata {
        filename: filename.to_string(),
        size: bytes.len() as u64,
        hash: sha256_hex(bytes),
        content_type: "application/octet-stream".to_string(),
        timestamp: "2026-10-19T00:00:00Z".to_string(),
    }
}
