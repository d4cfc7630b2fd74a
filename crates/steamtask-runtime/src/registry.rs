//! Active task tracking, cancellation, and cleanup.
//!
//! The registry is the coordination point between the runner (which
//! registers and deregisters processes) and cancellation requests coming
//! from the front end. The canceled set is deliberately separate from
//! the task map: a task id may be marked canceled before any process
//! exists for it, and the mark survives the process being replaced
//! during a retry cycle.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::debug;

use crate::shutdown;

/// Cleanup action run when a task is canceled (e.g. stopping a tailer).
pub type CleanupFn = Box<dyn FnOnce() + Send>;

/// Acknowledgment returned by [`TaskRegistry::cancel`].
///
/// Always `ok: true`: a cancel request is never rejected, even for an
/// unknown task id.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CancelAck {
    pub ok: bool,
}

#[derive(Default)]
struct TaskEntry {
    /// Pid of the running process. `None` for cleanup-only placeholder
    /// entries created before the process spawned.
    pid: Option<u32>,
    cleanup: Option<CleanupFn>,
}

/// Registry of active tasks keyed by opaque id.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, TaskEntry>>,
    canceled: Mutex<HashSet<String>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a spawned process to a task id.
    ///
    /// A cleanup already attached to the id (via [`Self::add_cleanup`]
    /// before the process spawned) is preserved unless a new one is
    /// supplied here.
    pub fn register(&self, task_id: &str, pid: u32, cleanup: Option<CleanupFn>) {
        if task_id.is_empty() {
            return;
        }
        let mut tasks = self.tasks.lock().unwrap();
        let entry = tasks.entry(task_id.to_string()).or_default();
        entry.pid = Some(pid);
        if cleanup.is_some() {
            entry.cleanup = cleanup;
        }
        debug!(task_id, pid, "task registered");
    }

    /// Attach or replace the cleanup action for a task id.
    ///
    /// Creates a cleanup-only placeholder entry when no process has been
    /// registered yet; this tolerates the race where a log tailer is
    /// wired up before the process spawns.
    pub fn add_cleanup(&self, task_id: &str, cleanup: CleanupFn) {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.entry(task_id.to_string()).or_default().cleanup = Some(cleanup);
    }

    /// Remove the entry for a task whose process has terminated.
    ///
    /// Called by the runner's completion path so process handles are
    /// never left dangling in the map.
    pub fn deregister(&self, task_id: &str) {
        self.tasks.lock().unwrap().remove(task_id);
    }

    /// Request cancellation of a task.
    ///
    /// The id is added to the canceled set unconditionally, then the
    /// registered process (and any replacement it spawned during a
    /// self-update) is terminated and the entry's cleanup is run.
    /// Returns immediately after issuing the signals; actual process
    /// death may lag by up to the escalation delay.
    pub async fn cancel(&self, task_id: &str) -> CancelAck {
        if !task_id.is_empty() {
            self.canceled.lock().unwrap().insert(task_id.to_string());
        }

        let entry = self.tasks.lock().unwrap().remove(task_id);
        let Some(entry) = entry else {
            return CancelAck { ok: true };
        };

        match entry.pid {
            Some(pid) => shutdown::kill_task_process(pid),
            // Registration race: the process may spawn moments from now.
            None => shutdown::schedule_image_kill(shutdown::NO_PID_FALLBACK_DELAY),
        }

        if let Some(cleanup) = entry.cleanup {
            cleanup();
        }

        debug!(task_id, "task canceled");
        CancelAck { ok: true }
    }

    /// Whether cancellation was requested for this task id.
    pub fn is_canceled(&self, task_id: &str) -> bool {
        self.canceled.lock().unwrap().contains(task_id)
    }

    /// Clear the canceled mark for a task id, returning whether it was
    /// set. Consumed exactly once per cancellation, by whoever needs to
    /// tell "failed" apart from "intentionally killed".
    pub fn consume_canceled(&self, task_id: &str) -> bool {
        self.canceled.lock().unwrap().remove(task_id)
    }

    /// Number of currently tracked tasks.
    pub fn active_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_cancel_unknown_task_is_acknowledged() {
        let registry = TaskRegistry::new();
        let ack = registry.cancel("nope").await;
        assert!(ack.ok);
        // The mark still lands, so a racing runner sees it.
        assert!(registry.is_canceled("nope"));
    }

    #[tokio::test]
    async fn test_cancel_ack_serializes_as_ok_true() {
        let registry = TaskRegistry::new();
        let ack = registry.cancel("x").await;
        assert_eq!(serde_json::to_string(&ack).unwrap(), "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_canceled_mark_is_consumed_once() {
        let registry = TaskRegistry::new();
        registry.cancel("mod:1").await;
        assert!(registry.is_canceled("mod:1"));
        assert!(registry.consume_canceled("mod:1"));
        assert!(!registry.is_canceled("mod:1"));
        assert!(!registry.consume_canceled("mod:1"));
    }

    #[tokio::test]
    async fn test_register_preserves_existing_cleanup() {
        let registry = TaskRegistry::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        registry.add_cleanup("t", Box::new(move || flag.store(true, Ordering::SeqCst)));

        // Registering without a cleanup merges, it does not overwrite.
        // Pid chosen to be far outside the default pid range.
        registry.register("t", 999_999, None);
        assert_eq!(registry.active_count(), 1);

        registry.cancel("t").await;
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_only_placeholder_entry() {
        let registry = TaskRegistry::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        registry.add_cleanup("early", Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert_eq!(registry.active_count(), 1);

        let ack = registry.cancel("early").await;
        assert!(ack.ok);
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_deregister_removes_entry() {
        let registry = TaskRegistry::new();
        registry.register("t", 42, None);
        assert_eq!(registry.active_count(), 1);
        registry.deregister("t");
        assert_eq!(registry.active_count(), 0);
        // Deregistering again is harmless.
        registry.deregister("t");
    }

    #[tokio::test]
    async fn test_empty_task_id_is_ignored() {
        let registry = TaskRegistry::new();
        registry.register("", 1, None);
        assert_eq!(registry.active_count(), 0);
        let ack = registry.cancel("").await;
        assert!(ack.ok);
        assert!(!registry.is_canceled(""));
    }
}
