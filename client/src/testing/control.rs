//! Tool server control plane

use anyhow::{Context, Result};
use protocol::control::{ErrorResponse, StartTunnelResponse, StopTunnelResponse, TunnelRequest};
use protocol::results::FileMetadata;
use protocol::{FILES_PATH, START_TUNNEL_PATH, STOP_TUNNEL_PATH};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Starts and stops tunnels and lists the files served through them
pub trait ControlPlane {
    fn start_tunnel(&self, tool: &str) -> impl Future<Output = Result<StartTunnelResponse>> + Send;

    fn stop_tunnel(&self, tool: &str) -> impl Future<Output = Result<String>> + Send;

    fn list_files(&self) -> impl Future<Output = Result<Vec<FileMetadata>>> + Send;
}

/// Control plane backed by the tool server's HTTP API
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: reqwest::Client,
    base_url: String,
}

impl HttpControlPlane {
    pub fn new(base_url: &str) -> Result<Self> {
        // Tunnel start can wait on slow tools (onion services take a while)
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_tunnel(&self, path: &str, tool: &str) -> Result<reqwest::Response> {
        let request = TunnelRequest {
            tool_name: tool.to_string(),
        };
        debug!("POST {} for {}", path, tool);
        let response = self
            .client
            .post(self.url(path))
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach tool server at {}", self.base_url))?;
        error_for_status(response).await
    }
}

/// Turn a non-2xx response into an error carrying the server's message
async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    anyhow::bail!("Tool server returned {}: {}", status.as_u16(), message)
}

impl ControlPlane for HttpControlPlane {
    async fn start_tunnel(&self, tool: &str) -> Result<StartTunnelResponse> {
        let response = self.post_tunnel(START_TUNNEL_PATH, tool).await?;
        response
            .json()
            .await
            .context("Malformed start-tunnel response")
    }

    async fn stop_tunnel(&self, tool: &str) -> Result<String> {
        let response = self.post_tunnel(STOP_TUNNEL_PATH, tool).await?;
        let body: StopTunnelResponse = response
            .json()
            .await
            .context("Malformed stop-tunnel response")?;
        Ok(body.message)
    }

    async fn list_files(&self) -> Result<Vec<FileMetadata>> {
        let response = self
            .client
            .get(self.url(FILES_PATH))
            .send()
            .await
            .with_context(|| format!("Failed to reach tool server at {}", self.base_url))?;
        error_for_status(response)
            .await?
            .json()
            .await
            .context("Malformed file catalog")
    }
}
