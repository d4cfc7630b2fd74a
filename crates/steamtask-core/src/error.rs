//! Error types for SteamCMD invocations.
//!
//! Cancellation is deliberately not an error: a canceled run resolves
//! with a canceled status so callers can distinguish "failed" from
//! "intentionally terminated" without matching on error variants.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running the tool.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The executable was missing or the OS refused to start it.
    /// Surfaced immediately, never retried.
    #[error("failed to launch {}: {source}", exe.display())]
    Spawn {
        exe: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but exited with a fatal status. `output` carries the
    /// tail of captured stderr, falling back to stdout.
    #[error("steamcmd exited {code}: {output}")]
    ToolExit { code: i32, output: String },

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for task operations
pub type TaskResult<T> = Result<T, TaskError>;
