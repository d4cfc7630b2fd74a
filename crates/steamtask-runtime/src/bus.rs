//! Event broadcasting for progress and log subscribers.
//!
//! Delivery is fire-and-forget, best-effort: an emit with no live
//! subscribers is dropped, a lagging subscriber loses the oldest events,
//! and neither case affects the emitter or other subscribers.

use steamtask_core::{LogEvent, LogSource, ProgressEvent};
use tokio::sync::broadcast;
use tracing::debug;

/// Broadcast channel capacity for progress events
const PROGRESS_CAPACITY: usize = 256;
/// Broadcast channel capacity for log events
const LOG_CAPACITY: usize = 1024;

/// Broadcaster for task progress and log events.
///
/// Owned by [`crate::TaskContext`]; not a global.
pub struct EventBus {
    progress_tx: broadcast::Sender<ProgressEvent>,
    log_tx: broadcast::Sender<LogEvent>,
}

impl EventBus {
    /// Create a new bus with no subscribers.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CAPACITY);
        let (log_tx, _) = broadcast::channel(LOG_CAPACITY);
        Self { progress_tx, log_tx }
    }

    /// Broadcast a progress event to all subscribers.
    pub fn emit_progress(&self, event: ProgressEvent) {
        if self.progress_tx.receiver_count() > 0 {
            debug!(task_id = %event.task_id, "broadcasting progress event");
        }
        let _ = self.progress_tx.send(event);
    }

    /// Broadcast a log line to all subscribers.
    pub fn emit_log(&self, source: LogSource, message: impl Into<String>) {
        let _ = self.log_tx.send(LogEvent::new(source, message));
    }

    /// Subscribe to progress events.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_tx.subscribe()
    }

    /// Subscribe to log events.
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEvent> {
        self.log_tx.subscribe()
    }

    /// Number of active progress subscribers.
    pub fn progress_subscriber_count(&self) -> usize {
        self.progress_tx.receiver_count()
    }

    /// Number of active log subscribers.
    pub fn log_subscriber_count(&self) -> usize {
        self.log_tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
