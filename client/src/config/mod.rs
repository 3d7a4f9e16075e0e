//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Base URL of the tool server (control plane and file catalog)
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default = "default_num_measurements")]
    pub num_measurements: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_diagnostic_tools")]
    pub tools: Vec<String>,
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,
    /// Port probed by tcptraceroute; defaults to the tunnel URL's port
    #[serde(default)]
    pub traceroute_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferConfig {
    /// curl `--max-time` for every download
    #[serde(default = "default_max_time_sec")]
    pub max_time_sec: u64,
    /// Parent directory for per-download scratch space; system temp if unset
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_capture_dir")]
    pub directory: PathBuf,
}

fn default_server_url() -> String {
    format!("http://localhost:{}", protocol::DEFAULT_PORT)
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_num_measurements() -> u32 {
    10
}

fn default_diagnostic_tools() -> Vec<String> {
    vec!["dig".to_string(), "tcptraceroute".to_string(), "ping".to_string()]
}

fn default_ping_count() -> u32 {
    5
}

fn default_max_time_sec() -> u64 {
    120
}

fn default_interface() -> String {
    "any".to_string()
}

fn default_capture_dir() -> PathBuf {
    PathBuf::from("captures")
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            results_dir: default_results_dir(),
            num_measurements: default_num_measurements(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            tools: default_diagnostic_tools(),
            ping_count: default_ping_count(),
            traceroute_port: None,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_time_sec: default_max_time_sec(),
            temp_dir: None,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interface: default_interface(),
            directory: default_capture_dir(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.general.num_measurements == 0 {
            anyhow::bail!("general.num_measurements must be at least 1");
        }
        if self.general.server_url.trim().is_empty() {
            anyhow::bail!("general.server_url must not be empty");
        }
        Ok(())
    }
}
