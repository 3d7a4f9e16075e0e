//! Measurement run orchestration
//!
//! A run walks one tunnel tool through
//! `SETUP -> DIAGNOSTICS -> MEASURE x N -> CLEANUP -> TEARDOWN` strictly in
//! order. A failure in any stage is recorded as a [`StageError`] and the run
//! carries on, so the caller always gets a complete [`RunResult`].
//!
//! Within a run there is never more than one external command or HTTP call
//! in flight: downloads through a single tunnel would otherwise contend for
//! bandwidth and skew each other's timings.

use crate::analysis;
use crate::capture::PacketCapture;
use crate::config::Config;
use crate::testing::{
    diagnostic_args, host_of, is_onion, port_of, run_diagnostic, run_web_test, ControlPlane,
    FileTransferVerifier,
};
use protocol::exec::run_sequence;
use protocol::results::{
    DiagnosticResult, Durations, FileMetadata, Measurement, MeasurementDurations, RunResult,
    StageError, Timing,
};
use protocol::{tools, CommandRunner};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const STAGE_TUNNEL_SETUP: &str = "Tunnel Setup";
pub const STAGE_POST_SETUP: &str = "Post-setup Commands";
pub const STAGE_PCAP_SETUP: &str = "PCAP Setup";
pub const STAGE_FILE_CATALOG: &str = "File Catalog";
pub const STAGE_DIAGNOSTICS: &str = "Diagnostics";
pub const STAGE_MEASUREMENTS: &str = "Measurements";
pub const STAGE_FILE_TRANSFER: &str = "File Transfer";
pub const STAGE_WEB_TEST: &str = "Web Test";
pub const STAGE_PCAP_CLEANUP: &str = "PCAP Cleanup";
pub const STAGE_TUNNEL_CLEANUP: &str = "Tunnel Cleanup";

/// Mutable state of one run; owned exclusively by [`Orchestrator::run`]
struct RunState {
    errors: Vec<StageError>,
    all_downloads_complete: bool,
}

impl RunState {
    fn new() -> Self {
        Self {
            errors: Vec::new(),
            all_downloads_complete: true,
        }
    }

    fn record(&mut self, stage: &str, error: impl ToString) {
        let error = error.to_string();
        warn!(stage, error = %error, "Stage failed");
        self.errors.push(StageError {
            stage: stage.to_string(),
            error,
        });
    }
}

pub struct Orchestrator<R, C> {
    runner: R,
    control: C,
    config: Config,
}

impl<R, C> Orchestrator<R, C>
where
    R: CommandRunner + Sync,
    C: ControlPlane,
{
    pub fn new(runner: R, control: C, config: Config) -> Self {
        Self {
            runner,
            control,
            config,
        }
    }

    /// Benchmark `tool` end to end; never fails
    pub async fn run(&self, tool: &str) -> RunResult {
        let run_started = Instant::now();
        let mut state = RunState::new();
        info!("Starting run for {}", tool);

        // SETUP
        let setup_started = Instant::now();
        let url = self.start_tunnel(tool, &mut state).await;
        let tool_setup = setup_started.elapsed();

        let capture = self.start_capture(tool, &mut state);
        let files = self.file_catalog(&mut state).await;

        if url.is_none() {
            // Nothing can be downloaded without a tunnel
            state.all_downloads_complete = false;
        }

        // DIAGNOSTICS
        let diagnostics_started = Instant::now();
        let diagnostics = self.diagnostics(url.as_deref(), &mut state).await;
        let diagnostics_time = diagnostics_started.elapsed();

        // MEASURE
        let measurement_started = Instant::now();
        let measurements = match url.as_deref() {
            Some(url) => self.measure(url, &files, &mut state).await,
            None => self.skip_measurements(&mut state),
        };
        let measurement_time = measurement_started.elapsed();

        // CLEANUP
        let pcap_file_path = match capture {
            Some(capture) => match capture.stop(&self.runner).await {
                Ok(path) => Some(path.to_string_lossy().into_owned()),
                Err(e) => {
                    state.record(STAGE_PCAP_CLEANUP, format!("{:#}", e));
                    None
                }
            },
            None => None,
        };

        // TEARDOWN
        // Sent even after a failed start; the server may still hold the tunnel
        match self.control.stop_tunnel(tool).await {
            Ok(message) => info!("{}", message),
            Err(e) => state.record(STAGE_TUNNEL_CLEANUP, format!("{:#}", e)),
        }

        let average = match measurements.len() {
            0 => Duration::ZERO,
            n => measurement_time / n as u32,
        };
        let aggregates = analysis::aggregate(&measurements);

        info!(
            "Run for {} finished in {:.1}s with {} error(s)",
            tool,
            run_started.elapsed().as_secs_f64(),
            state.errors.len()
        );

        RunResult {
            tool: tool.to_string(),
            diagnostics,
            measurements,
            durations: Durations {
                total: Timing::from_duration(run_started.elapsed()),
                tool_setup: Timing::from_duration(tool_setup),
                diagnostics: Timing::from_duration(diagnostics_time),
                measurements: MeasurementDurations {
                    total: Timing::from_duration(measurement_time),
                    average: Timing::from_duration(average),
                },
            },
            pcap_file_path,
            all_downloads_complete: state.all_downloads_complete,
            errors: state.errors,
            aggregates,
        }
    }

    async fn start_tunnel(&self, tool: &str, state: &mut RunState) -> Option<String> {
        let response = match self.control.start_tunnel(tool).await {
            Ok(response) => response,
            Err(e) => {
                state.record(STAGE_TUNNEL_SETUP, format!("{:#}", e));
                return None;
            }
        };

        if response.url.trim().is_empty() || host_of(&response.url).is_none() {
            state.record(
                STAGE_TUNNEL_SETUP,
                format!("Tunnel URL is empty or invalid: {:?}", response.url),
            );
            return None;
        }

        info!("{} tunnel up at {}", tool, response.url);
        if !response.readiness_verified {
            info!("{} returns its URL without confirming the tunnel is ready", tool);
        }

        // Post-setup commands are best effort
        if let Some(spec) = tools::find(tool) {
            let port = port_of(&self.config.general.server_url).unwrap_or(protocol::DEFAULT_PORT);
            if let Err(e) = run_sequence(&self.runner, &spec.post_setup(port)).await {
                state.record(STAGE_POST_SETUP, e);
            }
        }

        Some(response.url)
    }

    fn start_capture(&self, tool: &str, state: &mut RunState) -> Option<PacketCapture> {
        if !self.config.capture.enabled {
            return None;
        }
        match PacketCapture::start(&self.config.capture, tool) {
            Ok(capture) => Some(capture),
            Err(e) => {
                state.record(STAGE_PCAP_SETUP, format!("{:#}", e));
                None
            }
        }
    }

    async fn file_catalog(&self, state: &mut RunState) -> Vec<FileMetadata> {
        match self.control.list_files().await {
            Ok(files) => {
                debug!("{} file(s) in catalog", files.len());
                files
            }
            Err(e) => {
                state.record(STAGE_FILE_CATALOG, format!("{:#}", e));
                state.all_downloads_complete = false;
                Vec::new()
            }
        }
    }

    async fn diagnostics(&self, url: Option<&str>, state: &mut RunState) -> Vec<DiagnosticResult> {
        let Some(url) = url else {
            state.record(STAGE_DIAGNOSTICS, "Skipped diagnostics due to missing tunnel URL");
            return Vec::new();
        };
        if is_onion(url) {
            info!("Skipping diagnostics for onion address {}", url);
            return Vec::new();
        }
        let Some(host) = host_of(url) else {
            state.record(STAGE_DIAGNOSTICS, format!("Cannot determine host of {}", url));
            return Vec::new();
        };
        let port = port_of(url).unwrap_or(443);

        let mut results = Vec::with_capacity(self.config.diagnostics.tools.len());
        for tool in &self.config.diagnostics.tools {
            let args = diagnostic_args(tool, &host, port, &self.config.diagnostics);
            let result = run_diagnostic(&self.runner, tool, &args).await;
            if let Some(error) = &result.error {
                state.record(STAGE_DIAGNOSTICS, format!("{}: {}", tool, error));
            }
            results.push(result);
        }
        results
    }

    /// One empty measurement per configured iteration, each marked as skipped
    fn skip_measurements(&self, state: &mut RunState) -> Vec<Measurement> {
        (1..=self.config.general.num_measurements)
            .map(|number| {
                state.record(STAGE_MEASUREMENTS, "Skipped measurements due to missing tunnel URL");
                Measurement::new(number)
            })
            .collect()
    }

    async fn measure(&self, url: &str, files: &[FileMetadata], state: &mut RunState) -> Vec<Measurement> {
        let verifier = FileTransferVerifier::new(
            &self.runner,
            self.config.transfer.max_time_sec,
            self.config.transfer.temp_dir.clone(),
        );
        let count = self.config.general.num_measurements;
        let mut measurements = Vec::with_capacity(count as usize);

        for number in 1..=count {
            info!("Measurement {}/{}", number, count);
            let mut measurement = Measurement::new(number);

            for file in files {
                let result = verifier.transfer(url, &file.filename, file).await;
                state.all_downloads_complete &= result.is_complete();
                if let Some(error) = result.error() {
                    state.record(STAGE_FILE_TRANSFER, format!("{}: {}", file.filename, error));
                }
                measurement.file_transfers.insert(file.filename.clone(), result);
            }

            let web = run_web_test(&self.runner, url, self.config.transfer.max_time_sec).await;
            if let Some(error) = &web.error {
                state.record(STAGE_WEB_TEST, error);
            }
            measurement.web_tests.push(web);

            measurements.push(measurement);
        }

        measurements
    }
}
