//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub webtest: WebtestConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Also the local port every tunnel exposes
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_files_dir")]
    pub directory: PathBuf,
    /// Sizes of generated test files, e.g. "100KB", "1MB"
    #[serde(default = "default_sizes")]
    pub sizes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebtestConfig {
    /// Size of the inline script payload in KiB
    #[serde(default = "default_script_kb")]
    pub script_kb: usize,
    /// Number of image references to catalogued files
    #[serde(default = "default_image_count")]
    pub image_count: usize,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    protocol::DEFAULT_PORT
}

fn default_files_dir() -> PathBuf {
    PathBuf::from("test_files")
}

fn default_sizes() -> Vec<String> {
    ["100KB", "1MB", "10MB", "50MB", "100MB"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_script_kb() -> usize {
    512
}

fn default_image_count() -> usize {
    10
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            directory: default_files_dir(),
            sizes: default_sizes(),
        }
    }
}

impl Default for WebtestConfig {
    fn default() -> Self {
        Self {
            script_kb: default_script_kb(),
            image_count: default_image_count(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;

        if config.files.sizes.is_empty() {
            anyhow::bail!("files.sizes must list at least one size");
        }

        Ok(config)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
