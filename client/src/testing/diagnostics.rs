//! One-shot network diagnostics against the tunnel host

use crate::config::DiagnosticsConfig;
use crate::parsers::parse_diagnostic;
use protocol::results::{DiagnosticResult, Timing};
use protocol::CommandRunner;
use std::time::Instant;
use tracing::{debug, warn};

/// Arguments for diagnostic `tool` aimed at `host`
pub fn diagnostic_args(tool: &str, host: &str, port: u16, config: &DiagnosticsConfig) -> Vec<String> {
    match tool {
        "dig" => vec!["+stats".to_string(), host.to_string()],
        "ping" => vec!["-c".to_string(), config.ping_count.to_string(), host.to_string()],
        "tcptraceroute" => vec![
            host.to_string(),
            config.traceroute_port.unwrap_or(port).to_string(),
        ],
        _ => vec![host.to_string()],
    }
}

/// Run one diagnostic; a tool that fails still yields a record with empty output
pub async fn run_diagnostic<R: CommandRunner>(runner: &R, tool: &str, args: &[String]) -> DiagnosticResult {
    let started = Instant::now();
    match runner.run(tool, args).await {
        Ok(raw_output) => {
            let timing = Timing::from_duration(started.elapsed());
            debug!("{} finished in {:.0}ms", tool, timing.duration);
            DiagnosticResult {
                tool: tool.to_string(),
                parsed_output: Some(parse_diagnostic(tool, &raw_output)),
                raw_output,
                timing,
                error: None,
            }
        }
        Err(e) => {
            warn!("Diagnostic {} failed: {}", tool, e);
            DiagnosticResult::failed(tool, e.to_string())
        }
    }
}
