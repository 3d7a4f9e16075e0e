//! Packet capture for the duration of a run

use crate::config::CaptureConfig;
use anyhow::{Context, Result};
use protocol::CommandRunner;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// How long tcpdump gets to flush its buffer after SIGINT
const STOP_GRACE: Duration = Duration::from_secs(5);

/// A running `tcpdump` writing to a pcap file
pub struct PacketCapture {
    child: Child,
    path: PathBuf,
}

impl PacketCapture {
    pub fn start(config: &CaptureConfig, tool: &str) -> Result<Self> {
        std::fs::create_dir_all(&config.directory)
            .with_context(|| format!("Failed to create capture directory {:?}", config.directory))?;

        let path = config.directory.join(capture_file_name(tool));
        let mut command = Command::new("tcpdump");
        command.arg("-i").arg(&config.interface).arg("-w").arg(&path);
        let capture = Self::spawn(command, path).context("Failed to spawn tcpdump")?;

        info!("Capturing packets on {} to {:?}", config.interface, capture.path);
        Ok(capture)
    }

    fn spawn(mut command: Command, path: PathBuf) -> std::io::Result<Self> {
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        Ok(Self { child, path })
    }

    /// Interrupt tcpdump so it flushes the capture, then wait for it
    ///
    /// Fails when tcpdump had already died on its own or left no file behind.
    pub async fn stop<R: CommandRunner>(mut self, runner: &R) -> Result<PathBuf> {
        if let Some(status) = self.child.try_wait()? {
            if !status.success() {
                anyhow::bail!("tcpdump exited early ({})", status);
            }
        } else {
            if let Some(pid) = self.child.id() {
                let args = vec!["-INT".to_string(), pid.to_string()];
                if let Err(e) = runner.run("kill", &args).await {
                    debug!("Failed to interrupt tcpdump: {}", e);
                }
            }
            match tokio::time::timeout(STOP_GRACE, self.child.wait()).await {
                Ok(status) => {
                    status.context("Failed to reap tcpdump")?;
                }
                Err(_) => {
                    warn!("tcpdump ignored SIGINT for {}s, killing it", STOP_GRACE.as_secs());
                    self.child.start_kill().context("Failed to signal tcpdump")?;
                    self.child.wait().await.context("Failed to reap tcpdump")?;
                }
            }
        }

        if !self.path.exists() {
            anyhow::bail!("tcpdump wrote no capture file at {:?}", self.path);
        }
        info!("Packet capture saved to {:?}", self.path);
        Ok(self.path)
    }
}

fn capture_file_name(tool: &str) -> String {
    format!(
        "client_capture_{}_{}.pcap",
        tool,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    )
}
