//! Console summaries and CSV export

use anyhow::{Context, Result};
use protocol::results::RunResult;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One file transfer flattened for spreadsheets
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRow {
    pub tool: String,
    pub measurement_number: u32,
    pub filename: String,
    pub file_size: u64,
    pub content_type: String,
    pub transfer_success: bool,
    pub status_code: u16,
    pub download_speed: f64,
    pub upload_speed: f64,
    pub dns_lookup: f64,
    pub tcp_connection: f64,
    pub tls_handshake: f64,
    pub time_to_first_byte: f64,
    pub total_transfer_time: f64,
    pub hash_match: bool,
    pub size_match: bool,
    pub hash_calculation_time: f64,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub tool: String,
    pub total_ms: f64,
    pub tool_setup_ms: f64,
    pub measurements_ms: f64,
    pub average_download_speed: f64,
    pub all_downloads_complete: bool,
    pub errors: usize,
}

pub fn transfer_rows(result: &RunResult) -> Vec<TransferRow> {
    result
        .measurements
        .iter()
        .flat_map(|m| m.file_transfers.values().map(move |t| (m.measurement_number, t)))
        .map(|(measurement_number, t)| {
            let stats = t.transfer_stats();
            let split = stats.time_split();
            TransferRow {
                tool: result.tool.clone(),
                measurement_number,
                filename: t.filename().to_string(),
                file_size: t.original_metadata().size,
                content_type: t.original_metadata().content_type.clone(),
                transfer_success: t.transfer_success(),
                status_code: stats.status_code,
                download_speed: stats.speed_download,
                upload_speed: stats.speed_upload,
                dns_lookup: split.dns_lookup,
                tcp_connection: split.tcp_connection,
                tls_handshake: split.tls_handshake,
                time_to_first_byte: stats.ttfb(),
                total_transfer_time: split.total,
                hash_match: t.hash_match(),
                size_match: t.size_match(),
                hash_calculation_time: t.hash_match_details().time_taken,
                error: t.error().unwrap_or_default().to_string(),
            }
        })
        .collect()
}

pub fn summary_row(result: &RunResult) -> SummaryRow {
    let speeds: Vec<f64> = result
        .file_transfers()
        .filter(|t| t.transfer_success())
        .map(|t| t.transfer_stats().speed_download)
        .collect();
    let average_download_speed = if speeds.is_empty() {
        0.0
    } else {
        speeds.iter().sum::<f64>() / speeds.len() as f64
    };

    SummaryRow {
        tool: result.tool.clone(),
        total_ms: result.durations.total.duration,
        tool_setup_ms: result.durations.tool_setup.duration,
        measurements_ms: result.durations.measurements.total.duration,
        average_download_speed,
        all_downloads_complete: result.all_downloads_complete,
        errors: result.errors.len(),
    }
}

/// Write `transfers.csv` and `summary.csv` into `out_dir`
pub fn export_csv(results: &[RunResult], out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create export directory {:?}", out_dir))?;

    let transfers_path = out_dir.join("transfers.csv");
    let mut writer = csv::Writer::from_path(&transfers_path)
        .with_context(|| format!("Failed to create {:?}", transfers_path))?;
    for result in results {
        for row in transfer_rows(result) {
            writer.serialize(row)?;
        }
    }
    writer.flush()?;

    let summary_path = out_dir.join("summary.csv");
    let mut writer = csv::Writer::from_path(&summary_path)
        .with_context(|| format!("Failed to create {:?}", summary_path))?;
    for result in results {
        writer.serialize(summary_row(result))?;
    }
    writer.flush()?;

    Ok((transfers_path, summary_path))
}

/// Print a short per-run report
pub fn print_summary(result: &RunResult) {
    let summary = summary_row(result);
    println!();
    println!("=== {} ===", result.tool);
    println!("  Total time:         {:.1}s", summary.total_ms / 1000.0);
    println!("  Tunnel setup:       {:.1}s", summary.tool_setup_ms / 1000.0);
    println!(
        "  Measurements:       {} ({:.1}s avg)",
        result.measurements.len(),
        result.durations.measurements.average.duration / 1000.0
    );
    println!("  Avg download speed: {:.0} B/s", summary.average_download_speed);
    println!(
        "  Downloads complete: {}",
        if summary.all_downloads_complete { "yes" } else { "NO" }
    );
    for error in &result.errors {
        println!("  [{}] {}", error.stage, error.error);
    }
}

/// Fastest and slowest runs by total wall time
pub fn print_ranking(results: &[RunResult]) {
    let by_time = |r: &&RunResult| r.durations.total.duration;
    let fastest = results.iter().min_by(|a, b| by_time(a).total_cmp(&by_time(b)));
    let slowest = results.iter().max_by(|a, b| by_time(a).total_cmp(&by_time(b)));

    if let (Some(fastest), Some(slowest)) = (fastest, slowest) {
        println!();
        println!(
            "Fastest tool: {} ({:.1}s)",
            fastest.tool,
            fastest.durations.total.duration / 1000.0
        );
        println!(
            "Slowest tool: {} ({:.1}s)",
            slowest.tool,
            slowest.durations.total.duration / 1000.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::results::{
        CurlResult, Durations, FileMetadata, FileTransferResult, Measurement, TimeSplit, TransferOutcome,
    };
    use std::collections::BTreeMap;

    fn run(tool: &str) -> RunResult {
        let meta = FileMetadata {
            size: 4,
            ..FileMetadata::empty("f")
        };
        let ok = FileTransferResult::new(
            "f",
            meta.clone(),
            TransferOutcome {
                received: meta.clone(),
                transfer_success: true,
                hash_time_ms: 0.5,
                stats: CurlResult::new(200, TimeSplit::default(), 4, 400.0, 0.0),
                error: None,
            },
        );
        let failed = FileTransferResult::failed("f", meta, CurlResult::failed("x"), "timeout".to_string());

        let mut m1 = Measurement::new(1);
        m1.file_transfers.insert("f".to_string(), ok);
        let mut m2 = Measurement::new(2);
        m2.file_transfers.insert("f".to_string(), failed);

        RunResult {
            tool: tool.to_string(),
            diagnostics: Vec::new(),
            measurements: vec![m1, m2],
            durations: Durations::default(),
            pcap_file_path: None,
            all_downloads_complete: false,
            errors: Vec::new(),
            aggregates: BTreeMap::new(),
        }
    }

    #[test]
    fn test_rows_per_measurement_and_file() {
        let rows = transfer_rows(&run("Bore"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].measurement_number, 1);
        assert!(rows[0].transfer_success);
        assert_eq!(rows[1].error, "timeout");
        assert_eq!(rows[1].file_size, 4);
    }

    #[test]
    fn test_summary_ignores_failed_transfers() {
        let summary = summary_row(&run("Bore"));
        assert_eq!(summary.average_download_speed, 400.0);
        assert!(!summary.all_downloads_complete);
    }

    #[test]
    fn test_export_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let (transfers, summary) = export_csv(&[run("Bore"), run("Zrok")], dir.path()).unwrap();

        let transfers = std::fs::read_to_string(transfers).unwrap();
        assert!(transfers.starts_with("tool,measurementNumber,filename,"));
        assert_eq!(transfers.lines().count(), 5);

        let summary = std::fs::read_to_string(summary).unwrap();
        assert_eq!(summary.lines().count(), 3);
        assert!(summary.contains("Zrok"));
    }
}
