//! Wiring between the pure chunk parser and the event bus.

use crate::bus::EventBus;
use steamtask_core::{ProgressEvent, ProgressUpdate, parse_chunk};

/// Parse one raw output chunk and broadcast the resulting progress
/// event, if any.
///
/// Lossy on purpose: chunks matching none of the known shapes emit
/// nothing here (the raw text still reaches subscribers via the log
/// stream).
pub fn parse_and_emit(bus: &EventBus, task_id: &str, chunk: &str) {
    if task_id.is_empty() || chunk.is_empty() {
        return;
    }
    match parse_chunk(chunk) {
        Some(ProgressUpdate::Percent { percent, message }) => {
            bus.emit_progress(ProgressEvent::progress(task_id, percent, message));
        }
        Some(ProgressUpdate::Status { message }) => {
            bus.emit_progress(ProgressEvent::message(task_id, message));
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steamtask_core::ProgressPayload;

    #[tokio::test]
    async fn test_percent_chunk_reaches_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_progress();

        parse_and_emit(&bus, "server:install", "Update state (0x61) downloading, progress: 12.55 (120 / 956)");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.task_id, "server:install");
        assert!(matches!(
            event.payload,
            ProgressPayload::Progress { percent: 13, .. }
        ));
    }

    #[tokio::test]
    async fn test_unparseable_chunk_emits_nothing() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_progress();

        parse_and_emit(&bus, "t", "Loaded client id");
        parse_and_emit(&bus, "", "Downloading 10%");

        assert!(rx.try_recv().is_err());
    }
}
