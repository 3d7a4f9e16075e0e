//! The single active tunnel slot
//!
//! Every tunnel exposes the same local port, so at most one adapter may be
//! running. Starting a tool stops whatever was active first; the lock is held
//! for the whole start so two requests can never race for the slot.

use super::{TunnelAdapter, TunnelError};
use protocol::control::StartTunnelResponse;
use protocol::tools::{self, ToolSpec};
use protocol::{CommandRunner, SystemCommandRunner};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct TunnelSession<R = SystemCommandRunner> {
    port: u16,
    runner: R,
    tools: &'static [ToolSpec],
    active: Mutex<Option<TunnelAdapter<R>>>,
}

impl TunnelSession {
    pub fn new(port: u16) -> Self {
        Self::with_tools(port, SystemCommandRunner, tools::TOOLS)
    }
}

impl<R: CommandRunner + Clone + Sync> TunnelSession<R> {
    pub fn with_tools(port: u16, runner: R, tools: &'static [ToolSpec]) -> Self {
        Self {
            port,
            runner,
            tools,
            active: Mutex::new(None),
        }
    }

    pub async fn start(&self, tool_name: &str) -> Result<StartTunnelResponse, TunnelError> {
        let spec = tools::find_in(self.tools, tool_name)
            .ok_or_else(|| TunnelError::UnknownTool(tool_name.to_string()))?;

        let mut active = self.active.lock().await;
        if let Some(mut previous) = active.take() {
            info!("Stopping {} before starting {}", previous.name(), spec.name);
            previous.stop().await;
        }

        let mut adapter = TunnelAdapter::new(*spec, self.runner.clone(), self.port);
        match adapter.start().await {
            Ok(url) => {
                *active = Some(adapter);
                Ok(StartTunnelResponse {
                    url,
                    readiness_verified: spec.readiness_verified(),
                })
            }
            Err(e) => {
                warn!("Failed to start {}: {}", spec.name, e);
                adapter.stop().await;
                Err(e)
            }
        }
    }

    pub async fn stop(&self, tool_name: &str) -> Result<String, TunnelError> {
        let mut active = self.active.lock().await;
        let mut adapter = active.take().ok_or(TunnelError::NoActiveTunnel)?;
        if !adapter.name().eq_ignore_ascii_case(tool_name) {
            warn!("Stop requested for {} but {} is active; stopping it", tool_name, adapter.name());
        }
        adapter.stop().await;
        Ok(format!("{} tunnel stopped", adapter.name()))
    }

    /// Name of the running tool, if any
    #[cfg(test)]
    pub async fn active_tool(&self) -> Option<&'static str> {
        self.active.lock().await.as_ref().map(|a| a.name())
    }

    /// Stop whatever is running; used on server shutdown
    pub async fn shutdown(&self) {
        if let Some(mut adapter) = self.active.lock().await.take() {
            adapter.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::tools::UrlPattern;
    use std::sync::LazyLock;
    use std::time::Duration;

    static TEST_TOOLS: LazyLock<Vec<ToolSpec>> = LazyLock::new(|| {
        vec![
            ToolSpec::stream(
                "Alpha",
                "sh",
                &["-c", "echo https://alpha.example; sleep 30"],
                UrlPattern::plain(r"https://\S+"),
            ),
            ToolSpec::stream(
                "Beta",
                "sh",
                &["-c", "echo https://beta.example; sleep 30"],
                UrlPattern::plain(r"https://\S+"),
            ),
            ToolSpec::stream("Broken", "sh", &["-c", "exit 2"], UrlPattern::plain(r"https://\S+"))
                .timeout(Duration::from_secs(5)),
        ]
    });

    fn session() -> TunnelSession {
        TunnelSession::with_tools(3000, SystemCommandRunner, TEST_TOOLS.as_slice())
    }

    #[tokio::test]
    async fn test_start_replaces_active_tunnel() {
        let session = session();
        let first = session.start("alpha").await.unwrap();
        assert_eq!(first.url, "https://alpha.example");
        assert!(first.readiness_verified);

        let second = session.start("Beta").await.unwrap();
        assert_eq!(second.url, "https://beta.example");
        assert_eq!(session.active_tool().await, Some("Beta"));

        assert_eq!(session.stop("Beta").await.unwrap(), "Beta tunnel stopped");
        assert_eq!(session.active_tool().await, None);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = session().start("Gamma").await.unwrap_err();
        assert!(matches!(err, TunnelError::UnknownTool(_)));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_failed_start_leaves_slot_empty() {
        let session = session();
        assert!(session.start("Broken").await.is_err());
        assert_eq!(session.active_tool().await, None);
    }

    #[tokio::test]
    async fn test_stop_without_active_tunnel() {
        let session = session();
        assert!(matches!(session.stop("Alpha").await, Err(TunnelError::NoActiveTunnel)));
        session.shutdown().await;
    }
}
