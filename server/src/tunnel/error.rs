//! Tunnel error types

use protocol::CommandError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Pre-command failed: {0}")]
    PreCommand(#[from] CommandError),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} did not report a URL within {}s", .timeout.as_secs_f64())]
    StartTimeout { tool: String, timeout: Duration },

    #[error("{tool} exited ({status}) before reporting a URL")]
    ProcessExit { tool: String, status: String },

    #[error("Failed to read tunnel URL from {url}: {message}")]
    UrlApi { url: String, message: String },

    #[error("Invalid URL pattern for {tool}: {source}")]
    Pattern {
        tool: String,
        #[source]
        source: regex::Error,
    },

    #[error("No active tunnel")]
    NoActiveTunnel,
}

impl TunnelError {
    /// Errors caused by the request rather than the tool
    pub fn is_client_error(&self) -> bool {
        matches!(self, TunnelError::UnknownTool(_) | TunnelError::NoActiveTunnel)
    }
}
