//! Result file persistence
//!
//! One JSON document per run. Files are written to a temporary sibling and
//! renamed into place, so a results file on disk is always complete.

use anyhow::{Context, Result};
use protocol::results::RunResult;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Timestamp used in result paths, e.g. `26-10-19-14-03-59`
pub fn timestamp() -> String {
    chrono::Local::now().format("%y-%m-%d-%H-%M-%S").to_string()
}

/// Where results of a run land
#[derive(Debug, Clone)]
pub enum Layout {
    /// `<root>/all-<ts>/<tool>.json`, one directory per batch
    Batch { dir: PathBuf },
    /// `<root>/<tool>/<ts>.json`
    PerTool { root: PathBuf },
}

impl Layout {
    pub fn batch(root: &Path) -> Self {
        Layout::Batch {
            dir: root.join(format!("all-{}", timestamp())),
        }
    }

    pub fn per_tool(root: &Path) -> Self {
        Layout::PerTool {
            root: root.to_path_buf(),
        }
    }

    pub fn path_for(&self, tool: &str) -> PathBuf {
        match self {
            Layout::Batch { dir } => dir.join(format!("{}.json", tool)),
            Layout::PerTool { root } => root.join(tool).join(format!("{}.json", timestamp())),
        }
    }
}

pub struct ResultStore {
    layout: Layout,
}

impl ResultStore {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    pub fn save(&self, result: &RunResult) -> Result<PathBuf> {
        let path = self.layout.path_for(&result.tool);
        write_json_atomic(&path, result)?;
        info!("Results for {} saved to {:?}", result.tool, path);
        Ok(path)
    }
}

fn write_json_atomic(path: &Path, result: &RunResult) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("Result path has no parent: {:?}", path))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create results directory {:?}", dir))?;

    let json = serde_json::to_string_pretty(result).context("Failed to serialise run result")?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {:?}", dir))?;
    tmp.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write {:?}", tmp.path()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move results into {:?}", path))?;
    Ok(())
}

/// Every run result found in `dir` (recursively), in path order
pub fn load_dir(dir: &Path) -> Result<Vec<RunResult>> {
    let mut paths = Vec::new();
    collect_json(dir, &mut paths)?;
    paths.sort();

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        match serde_json::from_str::<RunResult>(&contents) {
            Ok(result) => results.push(result),
            Err(e) => warn!("Skipping {:?}: not a run result ({})", path, e),
        }
    }
    Ok(results)
}

fn collect_json(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_json(&path, paths)?;
        } else if path.extension().is_some_and(|e| e == "json") {
            paths.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::results::Durations;
    use std::collections::BTreeMap;

    fn result(tool: &str) -> RunResult {
        RunResult {
            tool: tool.to_string(),
            diagnostics: Vec::new(),
            measurements: Vec::new(),
            durations: Durations::default(),
            pcap_file_path: None,
            all_downloads_complete: true,
            errors: Vec::new(),
            aggregates: BTreeMap::new(),
        }
    }

    #[test]
    fn test_layout_paths() {
        let root = Path::new("results");
        let batch = Layout::batch(root).path_for("Bore");
        assert!(batch.starts_with("results"));
        assert!(batch.parent().unwrap().file_name().unwrap().to_string_lossy().starts_with("all-"));
        assert_eq!(batch.file_name().unwrap(), "Bore.json");

        let per_tool = Layout::per_tool(root).path_for("Bore");
        assert!(per_tool.starts_with("results/Bore"));
        assert_eq!(per_tool.extension().unwrap(), "json");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(Layout::batch(dir.path()));
        store.save(&result("Bore")).unwrap();
        store.save(&result("Zrok")).unwrap();
        std::fs::write(dir.path().join("notes.json"), "{\"unrelated\": true}").unwrap();

        let loaded = load_dir(dir.path()).unwrap();
        let tools: Vec<_> = loaded.iter().map(|r| r.tool.as_str()).collect();
        assert_eq!(tools, vec!["Bore", "Zrok"]);

        // no temporary files left behind
        let batch_dir = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .find(|e| e.path().is_dir())
            .unwrap()
            .path();
        let names: Vec<_> = std::fs::read_dir(batch_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "{:?}", names);
        assert!(names.iter().all(|n| n.ends_with(".json")));
    }

    #[test]
    fn test_save_replaces_existing_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(Layout::batch(dir.path()));
        let first = store.save(&result("Bore")).unwrap();

        let mut updated = result("Bore");
        updated.all_downloads_complete = false;
        let second = store.save(&updated).unwrap();

        assert_eq!(first, second);
        let loaded = load_dir(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!loaded[0].all_downloads_complete);
        assert_eq!(std::fs::read_dir(first.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_persisted_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = ResultStore::new(Layout::per_tool(dir.path())).save(&result("Bore")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["allDownloadsComplete"], true);
        assert!(json["durations"]["toolSetup"]["duration"].is_number());
        assert!(json["durations"]["measurements"]["average"].is_object());
        assert!(json.get("pcapFilePath").is_none());
    }
}
