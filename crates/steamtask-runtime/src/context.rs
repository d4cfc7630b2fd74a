//! Shared orchestration state.

use crate::bus::EventBus;
use crate::registry::TaskRegistry;

/// Owns the event bus and task registry for one orchestrator instance.
///
/// Components receive this by `Arc` from the top-level service; nothing
/// in the runtime reaches for process-wide state. Two contexts are fully
/// independent, which is what the tests rely on.
#[derive(Default)]
pub struct TaskContext {
    bus: EventBus,
    registry: TaskRegistry,
}

impl TaskContext {
    /// Create a fresh context with no active tasks or subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// The event bus for this orchestrator.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The task registry for this orchestrator.
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }
}
