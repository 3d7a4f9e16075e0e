//! Tool server control-plane messages

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelRequest {
    pub tool_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTunnelResponse {
    pub url: String,
    /// False when the tool's URL is returned without waiting for the tunnel
    #[serde(default = "default_true")]
    pub readiness_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopTunnelResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

fn default_true() -> bool {
    true
}
