//! Tunnelbench - Tunnel Tool Benchmark Client
//!
//! Drives tunnel tools through the tool server, measures downloads through
//! each tunnel and stores one JSON result per run.

mod analysis;
mod capture;
mod config;
mod orchestrator;
mod output;
mod parsers;
mod storage;
mod testing;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use orchestrator::Orchestrator;
use protocol::results::RunResult;
use protocol::tools::{self, ToolSpec};
use protocol::SystemCommandRunner;
use std::path::PathBuf;
use storage::{Layout, ResultStore};
use testing::{ControlPlane, HttpControlPlane};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "tunnelbench")]
#[command(version)]
#[command(about = "Benchmark tunnel tools by downloading test files through them", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "tunnelbench.toml")]
    config: PathBuf,

    /// Run every tool (auto) or a single tool
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Tool to benchmark in tool mode
    #[arg(short, long)]
    tool: Option<String>,

    /// Measurements per run (overrides the config file)
    #[arg(short = 'n', long)]
    measurements: Option<u32>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export every result in a directory as CSV
    Export {
        /// Directory holding result JSON files
        dir: PathBuf,

        /// Output directory (defaults to the input directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the known tools
    Tools,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Auto,
    Tool,
}

type Prompt = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    match &args.command {
        Some(Command::Export { dir, output }) => return run_export(dir, output.as_ref()),
        Some(Command::Tools) => {
            for tool in tools::TOOLS {
                let note = if tool.readiness_verified() { "" } else { " (readiness not verified)" };
                println!("{}{}", tool.name, note);
            }
            return Ok(());
        }
        None => {}
    }

    let mut config = config::Config::load_or_default(&args.config)?;
    if let Some(n) = args.measurements {
        if n == 0 {
            anyhow::bail!("--measurements must be at least 1");
        }
        config.general.num_measurements = n;
    }
    info!("Tunnelbench v{}", env!("CARGO_PKG_VERSION"));
    info!("Tool server: {}", config.general.server_url);

    let control = HttpControlPlane::new(&config.general.server_url)?;
    let results_dir = config.general.results_dir.clone();
    let orchestrator = Orchestrator::new(SystemCommandRunner, control, config);
    let mut prompt = BufReader::new(tokio::io::stdin()).lines();

    let mode = match args.mode {
        Some(mode) => mode,
        None => ask_mode(&mut prompt).await?,
    };

    match mode {
        Mode::Auto => run_auto(&orchestrator, &results_dir).await,
        Mode::Tool => match args.tool.as_deref() {
            Some(name) => {
                let tool = tools::find(name).with_context(|| format!("Unknown tool: {}", name))?;
                let store = ResultStore::new(Layout::per_tool(&results_dir));
                run_one(&orchestrator, &store, tool).await;
                Ok(())
            }
            None => run_interactive(&orchestrator, &results_dir, &mut prompt).await,
        },
    }
}

/// Benchmark one tool and persist its result; a failed save is only logged
async fn run_one<R, C>(orchestrator: &Orchestrator<R, C>, store: &ResultStore, tool: &ToolSpec) -> RunResult
where
    R: protocol::CommandRunner + Sync,
    C: ControlPlane,
{
    let result = orchestrator.run(tool.name).await;
    output::print_summary(&result);
    if let Err(e) = store.save(&result) {
        error!("Failed to save results for {}: {:#}", tool.name, e);
    }
    result
}

async fn run_auto<R, C>(orchestrator: &Orchestrator<R, C>, results_dir: &std::path::Path) -> Result<()>
where
    R: protocol::CommandRunner + Sync,
    C: ControlPlane,
{
    let store = ResultStore::new(Layout::batch(results_dir));
    let mut results = Vec::new();

    // One tool at a time: every tunnel exposes the same local port
    for tool in tools::batch() {
        results.push(run_one(orchestrator, &store, tool).await);
    }

    output::print_ranking(&results);
    Ok(())
}

async fn run_interactive<R, C>(
    orchestrator: &Orchestrator<R, C>,
    results_dir: &std::path::Path,
    prompt: &mut Prompt,
) -> Result<()>
where
    R: protocol::CommandRunner + Sync,
    C: ControlPlane,
{
    let store = ResultStore::new(Layout::per_tool(results_dir));

    loop {
        println!("Available tools:");
        for (i, tool) in tools::TOOLS.iter().enumerate() {
            println!("  {}. {}", i + 1, tool.name);
        }

        let choice = ask(prompt, "Enter the number of the tool to test: ").await?;
        let tool = choice
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| tools::TOOLS.get(i));

        match tool {
            Some(tool) => {
                run_one(orchestrator, &store, tool).await;
            }
            None => println!("Invalid choice: {}", choice.trim()),
        }

        let again = ask(prompt, "Do you want to test another tool? (y/n): ").await?;
        if !again.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }
    }
}

async fn ask_mode(prompt: &mut Prompt) -> Result<Mode> {
    loop {
        let answer = ask(prompt, "Run in auto mode (a) or tool-wise mode (t)? ").await?;
        match answer.trim().to_ascii_lowercase().as_str() {
            "a" | "auto" => return Ok(Mode::Auto),
            "t" | "tool" => return Ok(Mode::Tool),
            other => println!("Invalid choice: {}", other),
        }
    }
}

async fn ask(prompt: &mut Prompt, question: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;
    prompt
        .next_line()
        .await?
        .context("Standard input closed")
}

fn run_export(dir: &PathBuf, output: Option<&PathBuf>) -> Result<()> {
    let results = storage::load_dir(dir)?;
    if results.is_empty() {
        anyhow::bail!("No run results found in {:?}", dir);
    }
    info!("Found {} run result(s)", results.len());

    let (transfers, summary) = output::export_csv(&results, output.unwrap_or(dir))?;
    info!("Exported to {:?} and {:?}", transfers, summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags() {
        let args = Args::parse_from(["tunnelbench", "--mode", "tool", "--tool", "Bore", "-n", "3"]);
        assert_eq!(args.mode, Some(Mode::Tool));
        assert_eq!(args.tool.as_deref(), Some("Bore"));
        assert_eq!(args.measurements, Some(3));
        assert!(args.command.is_none());
    }

    #[test]
    fn test_export_subcommand() {
        let args = Args::parse_from(["tunnelbench", "export", "results/all-26-10-19-10-00-00"]);
        assert!(matches!(args.command, Some(Command::Export { .. })));
    }
}
