//! Unified task handles — one cancellation surface for every engine.
//!
//! The handle's atomic state flag is authoritative: queries never block and
//! never consult the host, even if the underlying primitive has not yet
//! observed a cancellation on its own thread.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tickfold_core::host::HostTaskId;
use tickfold_core::types::TaskId;

use crate::dispatch::EngineShared;

/// Lifecycle state of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Waiting for its next execution.
    Scheduled = 0,
    /// The runnable is executing right now.
    Running = 1,
    /// One-shot task finished. Terminal.
    Completed = 2,
    /// Cancelled by the caller or by the engine. Terminal.
    Cancelled = 3,
}

impl TaskState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Scheduled,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            _ => TaskState::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }
}

/// Why a task ended up `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CancelReason {
    /// `cancel()` was called on the handle.
    ByCaller = 1,
    /// The bound entity was no longer live at resolution time.
    EntityNotResolvable = 2,
    /// The relocation-retry budget ran out.
    DispatchExhausted = 3,
}

impl CancelReason {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(CancelReason::ByCaller),
            2 => Some(CancelReason::EntityNotResolvable),
            3 => Some(CancelReason::DispatchExhausted),
            _ => None,
        }
    }
}

/// How often the task runs, and through which host family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cadence {
    /// One-shot.
    Once,
    /// Repeating on the engine, rescheduled every `period` ticks.
    EveryTicks(NonZeroU64),
    /// Repeating off-engine; the async facility drives the period itself.
    Async,
}

impl Cadence {
    pub(crate) fn is_repeating(&self) -> bool {
        !matches!(self, Cadence::Once)
    }
}

/// Which host family holds the underlying primitive, for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    Engine,
    Async,
}

/// Engine-owned state for one scheduled task. Callers only ever see the
/// [`TaskHandle`] wrapper; the dispatch engine exclusively owns the mapping
/// from here to the live host primitive.
#[derive(Debug)]
pub(crate) struct TaskCore {
    id: TaskId,
    cadence: Cadence,
    route: Route,
    state: AtomicU8,
    reason: AtomicU8,
    host_task: Mutex<Option<HostTaskId>>,
}

impl TaskCore {
    pub(crate) fn new(id: TaskId, cadence: Cadence, route: Route) -> Self {
        Self {
            id,
            cadence,
            route,
            state: AtomicU8::new(TaskState::Scheduled as u8),
            reason: AtomicU8::new(0),
            host_task: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub(crate) fn route(&self) -> Route {
        self.route
    }

    pub(crate) fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Scheduled → Running`, immediately before invoking the runnable.
    /// False means the task was cancelled in the meantime and must not run.
    pub(crate) fn try_begin_run(&self) -> bool {
        self.state
            .compare_exchange(
                TaskState::Scheduled as u8,
                TaskState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Close out one execution. Returns true if the task remains scheduled
    /// for another cycle (repeating and not cancelled mid-run).
    pub(crate) fn finish_run(&self) -> bool {
        let next = if self.cadence.is_repeating() {
            TaskState::Scheduled
        } else {
            TaskState::Completed
        };
        let cycled = self
            .state
            .compare_exchange(
                TaskState::Running as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        cycled && self.cadence.is_repeating()
    }

    /// Transition to `Cancelled` from any non-terminal state, recording the
    /// first reason. Returns false if already terminal.
    pub(crate) fn cancel(&self, reason: CancelReason) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if TaskState::from_u8(current).is_terminal() {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                TaskState::Cancelled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let _ = self.reason.compare_exchange(
                        0,
                        reason as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                    return true;
                }
                Err(observed) => current = observed,
            }
        }
    }

    pub(crate) fn cancel_reason(&self) -> Option<CancelReason> {
        CancelReason::from_u8(self.reason.load(Ordering::Acquire))
    }

    pub(crate) fn set_host_task(&self, id: HostTaskId) {
        *self.host_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
    }

    pub(crate) fn take_host_task(&self) -> Option<HostTaskId> {
        self.host_task.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Caller-visible handle for a scheduled unit of work. Cheap to clone; all
/// clones observe and control the same task.
#[derive(Clone)]
pub struct TaskHandle {
    core: Arc<TaskCore>,
    engine: Weak<EngineShared>,
}

impl TaskHandle {
    pub(crate) fn new(core: Arc<TaskCore>, engine: Weak<EngineShared>) -> Self {
        Self { core, engine }
    }

    pub fn id(&self) -> TaskId {
        self.core.id()
    }

    pub fn state(&self) -> TaskState {
        self.core.state()
    }

    pub fn is_running(&self) -> bool {
        self.core.state() == TaskState::Running
    }

    pub fn is_cancelled(&self) -> bool {
        self.core.state() == TaskState::Cancelled
    }

    /// Why the task was cancelled, once it is.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.core.cancel_reason()
    }

    /// Cancel the task. True if this call performed the transition from a
    /// non-terminal state; false if the task had already completed or been
    /// cancelled. Idempotent and safe to call concurrently. Returns
    /// immediately: an execution that already started is allowed to finish,
    /// but no further execution occurs.
    pub fn cancel(&self) -> bool {
        if !self.core.cancel(CancelReason::ByCaller) {
            return false;
        }
        if let Some(engine) = self.engine.upgrade() {
            engine.retire(&self.core);
        }
        true
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.core.id())
            .field("state", &self.core.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_shot() -> TaskCore {
        TaskCore::new(TaskId(1), Cadence::Once, Route::Engine)
    }

    fn repeating() -> TaskCore {
        TaskCore::new(TaskId(2), Cadence::EveryTicks(NonZeroU64::new(20).unwrap()), Route::Engine)
    }

    #[test]
    fn test_one_shot_lifecycle() {
        let core = one_shot();
        assert_eq!(core.state(), TaskState::Scheduled);
        assert!(core.try_begin_run());
        assert_eq!(core.state(), TaskState::Running);
        assert!(!core.finish_run());
        assert_eq!(core.state(), TaskState::Completed);
        // Terminal: cancel is a no-op now.
        assert!(!core.cancel(CancelReason::ByCaller));
        assert_eq!(core.cancel_reason(), None);
    }

    #[test]
    fn test_repeating_cycles_back_to_scheduled() {
        let core = repeating();
        for _ in 0..3 {
            assert!(core.try_begin_run());
            assert!(core.finish_run());
            assert_eq!(core.state(), TaskState::Scheduled);
        }
    }

    #[test]
    fn test_cancel_while_scheduled_blocks_run() {
        let core = repeating();
        assert!(core.cancel(CancelReason::ByCaller));
        assert!(!core.try_begin_run());
        assert_eq!(core.state(), TaskState::Cancelled);
    }

    #[test]
    fn test_cancel_mid_run_stops_repeating() {
        let core = repeating();
        assert!(core.try_begin_run());
        assert!(core.cancel(CancelReason::ByCaller));
        // The in-flight execution finishes but the task does not re-arm.
        assert!(!core.finish_run());
        assert_eq!(core.state(), TaskState::Cancelled);
    }

    #[test]
    fn test_first_cancel_reason_sticks() {
        let core = repeating();
        assert!(core.cancel(CancelReason::EntityNotResolvable));
        assert!(!core.cancel(CancelReason::ByCaller));
        assert_eq!(core.cancel_reason(), Some(CancelReason::EntityNotResolvable));
    }
}
