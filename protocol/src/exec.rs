//! External command execution
//!
//! Every diagnostic, transfer and tunnel pre-command is an external process.
//! The runner waits for the process to exit, collecting stdout and stderr
//! separately, and only succeeds on exit code 0. There is no timeout at this
//! layer; callers that need a bound pass it to the tool itself (e.g. curl
//! `--max-time`) or race the call against a timer.

use crate::error::CommandError;
use std::future::Future;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs an external command to completion and returns its stdout
pub trait CommandRunner {
    fn run(
        &self,
        command: &str,
        args: &[String],
    ) -> impl Future<Output = Result<String, CommandError>> + Send;
}

impl<R: CommandRunner + Sync> CommandRunner for &R {
    fn run(
        &self,
        command: &str,
        args: &[String],
    ) -> impl Future<Output = Result<String, CommandError>> + Send {
        (**self).run(command, args)
    }
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(
        &self,
        command: &str,
        args: &[String],
    ) -> impl Future<Output = Result<String, CommandError>> + Send {
        let command = command.to_string();
        let args = args.to_vec();
        async move { run_command(&command, &args).await }
    }
}

/// Spawn `command` with `args`, wait for exit, return stdout on exit code 0
pub async fn run_command(command: &str, args: &[String]) -> Result<String, CommandError> {
    debug!("Executing command: {} {}", command, args.join(" "));

    let output = Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!("Command {} exited with {}", command, output.status);
        return Err(CommandError::Failed {
            command: command.to_string(),
            code: output.status.code(),
            stderr,
        });
    }

    debug!("Command {} completed ({} bytes of output)", command, stdout.len());
    Ok(stdout)
}

/// Run a list of `[program, arg, ...]` commands in order, stopping at the first failure
pub async fn run_sequence<R: CommandRunner>(
    runner: &R,
    commands: &[Vec<String>],
) -> Result<(), CommandError> {
    for command in commands {
        let Some((program, args)) = command.split_first() else {
            continue;
        };
        runner.run(program, args).await?;
    }
    Ok(())
}
