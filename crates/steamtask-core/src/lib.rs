//! Domain types for SteamCMD task orchestration.
//!
//! This crate holds the event payloads exchanged with front-end
//! collaborators, the error taxonomy for tool invocations, and the pure
//! parser that turns raw SteamCMD output into progress signals. OS and
//! runtime concerns (spawning, killing, tailing) live in
//! `steamtask-runtime`.

pub mod error;
pub mod events;
pub mod progress;

// Re-export commonly used types for convenience
pub use error::{TaskError, TaskResult};
pub use events::{LogEvent, LogSource, ProgressEvent, ProgressPayload, TaskCode};
pub use progress::{ProgressUpdate, parse_chunk};
