//! Protocol error types

use thiserror::Error;

/// An external command that could not be run to a successful exit
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command {command} failed with code {}: {}", display_code(.code), .stderr.trim())]
    Failed {
        command: String,
        /// `None` when the process was terminated by a signal
        code: Option<i32>,
        stderr: String,
    },
}

impl CommandError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Spawn { .. } => None,
            CommandError::Failed { code, .. } => *code,
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            CommandError::Spawn { .. } => "",
            CommandError::Failed { stderr, .. } => stderr,
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}
