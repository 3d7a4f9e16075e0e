//! Test file catalog
//!
//! Files are generated once from random bytes and reused across restarts;
//! their metadata is recomputed at startup so the catalog always describes
//! what is on disk.

use crate::config::FilesConfig;
use anyhow::{Context, Result};
use protocol::digest::sha256_file;
use protocol::results::FileMetadata;
use rand::RngCore;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
pub struct FileCatalog {
    directory: PathBuf,
    files: BTreeMap<String, FileMetadata>,
}

impl FileCatalog {
    /// Generate missing files and describe every configured one
    pub async fn prepare(config: &FilesConfig) -> Result<Self> {
        let config = config.clone();
        tokio::task::spawn_blocking(move || Self::prepare_blocking(&config))
            .await
            .context("File preparation task panicked")?
    }

    fn prepare_blocking(config: &FilesConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.directory)
            .with_context(|| format!("Failed to create {:?}", config.directory))?;

        let mut files = BTreeMap::new();
        for label in &config.sizes {
            let size = parse_size(label)?;
            let filename = format!("file_{}", label);
            let path = config.directory.join(&filename);

            let up_to_date = std::fs::metadata(&path).is_ok_and(|m| m.len() == size);
            if !up_to_date {
                info!("Generating {} ({} bytes)", filename, size);
                generate(&path, size)?;
            }

            let metadata = describe(&path, &filename)?;
            files.insert(filename, metadata);
        }

        info!("Catalog ready with {} file(s)", files.len());
        Ok(Self {
            directory: config.directory.clone(),
            files,
        })
    }

    pub fn list(&self) -> Vec<FileMetadata> {
        self.files.values().cloned().collect()
    }

    pub fn get(&self, filename: &str) -> Option<&FileMetadata> {
        self.files.get(filename)
    }

    /// Path of a catalogued file; `None` for anything not in the catalog
    pub fn path_of(&self, filename: &str) -> Option<PathBuf> {
        self.files.get(filename).map(|_| self.directory.join(filename))
    }
}

/// Parse sizes like `512B`, `100KB`, `1MB` or `2GB` (binary multiples)
pub fn parse_size(label: &str) -> Result<u64> {
    let label = label.trim();
    let split = label
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(label.len());
    let (number, unit) = label.split_at(split);
    let number: u64 = number
        .parse()
        .with_context(|| format!("Invalid file size: {:?}", label))?;

    let multiplier = match unit.to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        other => anyhow::bail!("Unknown size unit {:?} in {:?}", other, label),
    };
    Ok(number * multiplier)
}

fn generate(path: &Path, size: u64) -> Result<()> {
    let mut file = std::io::BufWriter::new(
        std::fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?,
    );
    let mut rng = rand::thread_rng();
    let mut chunk = vec![0u8; 1024 * 1024];
    let mut remaining = size;
    while remaining > 0 {
        let n = remaining.min(chunk.len() as u64) as usize;
        rng.fill_bytes(&mut chunk[..n]);
        file.write_all(&chunk[..n])?;
        remaining -= n as u64;
    }
    file.flush()?;
    Ok(())
}

fn describe(path: &Path, filename: &str) -> Result<FileMetadata> {
    let meta = std::fs::metadata(path).with_context(|| format!("Failed to stat {:?}", path))?;
    let modified: chrono::DateTime<chrono::Utc> = meta.modified()?.into();
    Ok(FileMetadata {
        filename: filename.to_string(),
        size: meta.len(),
        hash: sha256_file(path).with_context(|| format!("Failed to hash {:?}", path))?,
        content_type: CONTENT_TYPE.to_string(),
        timestamp: modified.to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512B").unwrap(), 512);
        assert_eq!(parse_size("100KB").unwrap(), 100 * 1024);
        assert_eq!(parse_size("1mb").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("7").unwrap(), 7);
        assert!(parse_size("MB").is_err());
        assert!(parse_size("10XB").is_err());
    }

    #[tokio::test]
    async fn test_prepare_generates_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let config = FilesConfig {
            directory: dir.path().to_path_buf(),
            sizes: vec!["1KB".to_string(), "3KB".to_string()],
        };

        let catalog = FileCatalog::prepare(&config).await.unwrap();
        let files = catalog.list();
        assert_eq!(files.len(), 2);

        let small = catalog.get("file_1KB").unwrap();
        assert_eq!(small.size, 1024);
        let bytes = std::fs::read(dir.path().join("file_1KB")).unwrap();
        assert_eq!(small.hash, protocol::digest::sha256_hex(&bytes));

        // existing files are kept as they are
        let again = FileCatalog::prepare(&config).await.unwrap();
        assert_eq!(again.get("file_1KB").unwrap().hash, small.hash);

        assert!(catalog.path_of("../etc/passwd").is_none());
        assert!(catalog.path_of("file_3KB").is_some());
    }
}
