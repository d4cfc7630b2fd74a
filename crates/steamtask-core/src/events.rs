//! Task progress and log events for real-time state synchronization.
//!
//! These events are emitted by the runtime and consumed by front-end
//! collaborators to render task progress and log panes. Delivery is
//! fire-and-forget: a subscriber that is not listening at emission time
//! never receives the event, and nothing is replayed.

use serde::{Deserialize, Serialize};

/// Terminal code for a task.
///
/// Either the tool's raw exit code or the canceled sentinel, which
/// supersedes any exit code. On the wire this is `int | "canceled"`,
/// hence the hand-written serde impls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCode {
    /// Raw process exit code.
    Exit(i32),
    /// The task was terminated on user request.
    Canceled,
}

impl Serialize for TaskCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Exit(code) => serializer.serialize_i32(*code),
            Self::Canceled => serializer.serialize_str("canceled"),
        }
    }
}

impl<'de> Deserialize<'de> for TaskCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(i32),
            Sentinel(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Ok(Self::Exit(code)),
            Raw::Sentinel(s) if s == "canceled" => Ok(Self::Canceled),
            Raw::Sentinel(other) => Err(serde::de::Error::custom(format!(
                "unknown task code {other:?}"
            ))),
        }
    }
}

/// Progress event payload variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressPayload {
    /// A percentage was extracted from the tool's output.
    Progress { percent: u8, message: String },
    /// A human-readable status line with no percentage attached.
    Message { message: String },
    /// The invocation failed before or while running.
    Error { message: String },
    /// Terminal event, emitted exactly once per top-level invocation.
    Done { code: TaskCode },
}

/// A progress update for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Opaque task identifier.
    pub task_id: String,
    #[serde(flatten)]
    pub payload: ProgressPayload,
}

impl ProgressEvent {
    /// Create a percentage progress event.
    pub fn progress(task_id: impl Into<String>, percent: u8, message: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            payload: ProgressPayload::Progress {
                percent,
                message: message.into(),
            },
        }
    }

    /// Create a plain status message event.
    pub fn message(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            payload: ProgressPayload::Message {
                message: message.into(),
            },
        }
    }

    /// Create an error event.
    pub fn error(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            payload: ProgressPayload::Error {
                message: message.into(),
            },
        }
    }

    /// Create the terminal event for a task.
    pub fn done(task_id: impl Into<String>, code: TaskCode) -> Self {
        Self {
            task_id: task_id.into(),
            payload: ProgressPayload::Done { code },
        }
    }
}

/// Origin of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    /// SteamCMD's own output (live stream or tailed log files).
    Steamcmd,
    /// The provisioned game-server process.
    Server,
}

/// A single log line from the tool or the provisioned server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Where the line came from.
    pub source: LogSource,
    /// The line content. May span multiple lines for chunked output.
    pub message: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

impl LogEvent {
    /// Create a new log event with the current timestamp.
    pub fn new(source: LogSource, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
            timestamp: Self::now_ms(),
        }
    }

    /// Get current time as Unix milliseconds.
    fn now_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64
    }
}
