//! Process runtime and OS-level concerns for steamtask.
//!
//! This crate orchestrates long-running SteamCMD invocations as
//! cancelable, retryable, progress-reporting tasks:
//!
//! - [`TaskContext`] - owns the event bus and task registry for one
//!   orchestrator instance (no process-wide singletons)
//! - [`ToolRunner`] - spawns SteamCMD, streams its output, and applies
//!   the retry-on-self-update exit policy
//! - [`TaskRegistry`] - tracks active tasks and terminates their
//!   process trees on cancellation
//! - [`EventBus`] - fire-and-forget broadcast of progress and log events
//! - [`start_tail`] - polling tailer over SteamCMD's on-disk log files,
//!   for the platforms where its live stream is buffered

pub mod args;
pub mod bus;
pub mod context;
pub mod progress;
pub mod registry;
pub mod runner;
mod shutdown;
pub mod tailer;

// Re-export commonly used types
pub use args::{Branch, app_update_args, steamcmd_executable, workshop_item_args};
pub use bus::EventBus;
pub use context::TaskContext;
pub use progress::parse_and_emit;
pub use registry::{CancelAck, CleanupFn, TaskRegistry};
pub use runner::{DEFAULT_RETRIES, RunStatus, ToolOutput, ToolRunner};
pub use tailer::{DEFAULT_TAIL_INTERVAL, TailHandle, start_tail};
