//! The dispatch engine — routing, lifecycle, and the relocation-retry
//! protocol.
//!
//! Every intended execution of a context-bound task under the regioned
//! engine goes through the same cycle: resolve the current owner, submit a
//! one-shot unit to it, and if the owner rejects (ownership moved between
//! resolution and submission) re-resolve after a doubling, capped backoff
//! until the retry budget runs out. Under the global engine the cycle
//! degenerates to direct submission; the budget is never touched.
//!
//! The handle-id map is the engine's only mutable shared structure. It is a
//! lock-free concurrent map so cancelling one task never serializes against
//! unrelated regions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tickfold_core::config::RetryConfig;
use tickfold_core::error::{Result, TickfoldError};
use tickfold_core::host::{AsyncHost, HostTaskId, Job, SubmitRejected};
use tickfold_core::types::{ScheduleSpec, TaskContext, TaskId};

use crate::detect::EngineBinding;
use crate::handle::{Cadence, CancelReason, Route, TaskCore, TaskHandle, TaskState};
use crate::resolve::{ResolvedTarget, resolve};

/// The user runnable, shared across dispatch cycles. The host guarantees a
/// repeating task never overlaps itself, so this lock is uncontended.
type SharedTaskFn = Arc<Mutex<Box<dyn FnMut(&TaskHandle) + Send + 'static>>>;

/// Budget for one intended execution's relocation retries. Fresh per cycle.
#[derive(Debug, Clone, Copy)]
struct RetryBudget {
    attempts_remaining: u32,
    backoff_ticks: u64,
}

impl RetryBudget {
    fn fresh(config: &RetryConfig) -> Self {
        Self {
            attempts_remaining: config.max_attempts,
            backoff_ticks: config.initial_backoff_ticks,
        }
    }

    /// Consume one attempt: the backoff to wait now, and the budget the
    /// re-resolution carries. `None` once spent.
    fn consume(self, config: &RetryConfig) -> Option<(u64, RetryBudget)> {
        if self.attempts_remaining == 0 {
            return None;
        }
        let next = RetryBudget {
            attempts_remaining: self.attempts_remaining - 1,
            backoff_ticks: (self.backoff_ticks.saturating_mul(2)).min(config.max_backoff_ticks),
        };
        Some((self.backoff_ticks, next))
    }
}

/// Shared state behind the facade: the engine binding, the async facility,
/// the retry policy, and the live-task map.
pub(crate) struct EngineShared {
    binding: EngineBinding,
    async_host: Option<Arc<dyn AsyncHost>>,
    retry: RetryConfig,
    tasks: papaya::HashMap<u64, Arc<TaskCore>>,
    next_id: AtomicU64,
}

impl EngineShared {
    pub(crate) fn new(
        binding: EngineBinding,
        async_host: Option<Arc<dyn AsyncHost>>,
        retry: RetryConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            binding,
            async_host,
            retry,
            tasks: papaya::HashMap::new(),
            next_id: AtomicU64::new(0),
        })
    }

    fn alloc_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Submit an engine-bound task. Infallible past validation: a dead
    /// entity at submission time yields a handle already `Cancelled` with
    /// reason `EntityNotResolvable`, not an error.
    pub(crate) fn submit(
        self: &Arc<Self>,
        context: TaskContext,
        spec: ScheduleSpec,
        runnable: impl FnMut(&TaskHandle) + Send + 'static,
    ) -> TaskHandle {
        let cadence = match spec.period_ticks {
            Some(period) => Cadence::EveryTicks(period),
            None => Cadence::Once,
        };
        let core = Arc::new(TaskCore::new(self.alloc_id(), cadence, Route::Engine));
        self.tasks.pin().insert(core.id().0, core.clone());
        let runnable: SharedTaskFn = Arc::new(Mutex::new(Box::new(runnable)));
        tracing::debug!(
            "📥 {} submitted ({:?}, delay {}t, period {:?})",
            core.id(),
            context,
            spec.delay_ticks,
            spec.period_ticks,
        );

        match &self.binding {
            EngineBinding::Global(tick) => {
                let job = self.engine_job(&core, &runnable);
                let host_id = tick.submit(job, spec.delay_ticks, spec.period_ticks);
                self.attach(&core, host_id);
            }
            EngineBinding::Regioned(region) => match context {
                TaskContext::Global => {
                    let job = self.engine_job(&core, &runnable);
                    let host_id = region.submit_global(job, spec.delay_ticks, spec.period_ticks);
                    self.attach(&core, host_id);
                }
                bound => {
                    self.dispatch_bound(
                        core.clone(),
                        bound,
                        runnable,
                        spec.delay_ticks,
                        RetryBudget::fresh(&self.retry),
                    );
                }
            },
        }

        TaskHandle::new(core, Arc::downgrade(self))
    }

    /// Submit an off-engine asynchronous task. Bypasses context resolution
    /// entirely; there is no ownership to race on.
    pub(crate) fn submit_async(
        self: &Arc<Self>,
        initial: Duration,
        period: Option<Duration>,
        runnable: impl FnMut(&TaskHandle) + Send + 'static,
    ) -> Result<TaskHandle> {
        let Some(async_host) = &self.async_host else {
            return Err(TickfoldError::EnvironmentUnavailable);
        };
        let cadence = if period.is_some() { Cadence::Async } else { Cadence::Once };
        let core = Arc::new(TaskCore::new(self.alloc_id(), cadence, Route::Async));
        self.tasks.pin().insert(core.id().0, core.clone());
        let runnable: SharedTaskFn = Arc::new(Mutex::new(Box::new(runnable)));
        tracing::debug!("📥 {} submitted (async, initial {:?}, period {:?})", core.id(), initial, period);

        let job = self.engine_job(&core, &runnable);
        let host_id = async_host.spawn(job, initial, period);
        self.attach(&core, host_id);
        Ok(TaskHandle::new(core, Arc::downgrade(self)))
    }

    /// One relocation-retry cycle: resolve the current owner and submit a
    /// one-shot unit to it. Invoked at submission and, for repeating tasks,
    /// once per period — never cached across cycles.
    ///
    /// A pending delay is waited out on the global owner first, so that
    /// resolution happens when the delay expires, not when the task was
    /// submitted. An entity can migrate arbitrarily while the delay runs.
    fn dispatch_bound(
        self: &Arc<Self>,
        core: Arc<TaskCore>,
        context: TaskContext,
        runnable: SharedTaskFn,
        delay_ticks: u64,
        budget: RetryBudget,
    ) {
        let EngineBinding::Regioned(region) = &self.binding else {
            return;
        };
        if core.state() == TaskState::Cancelled {
            self.retire(&core);
            return;
        }

        if delay_ticks > 0 {
            let engine = self.clone();
            let timer_core = core.clone();
            let timer: Job = Box::new(move || {
                engine.dispatch_bound(timer_core.clone(), context, runnable.clone(), 0, budget);
            });
            let host_id = region.submit_global(timer, delay_ticks, None);
            self.attach(&core, host_id);
            return;
        }

        let owner = match resolve(&self.binding, &context) {
            Ok(ResolvedTarget::Owner(owner)) => Some(owner),
            Ok(_) => None,
            Err(error) => {
                tracing::warn!("⚠️ {} cancelled: {error}", core.id());
                core.cancel(CancelReason::EntityNotResolvable);
                self.retire(&core);
                return;
            }
        };

        let job = self.bound_job(&core, context, &runnable);
        let submitted = match owner {
            Some(owner) => region.submit_to(owner, job, delay_ticks, None),
            None => Ok(region.submit_global(job, delay_ticks, None)),
        };

        match submitted {
            Ok(host_id) => self.attach(&core, host_id),
            Err(SubmitRejected) => self.schedule_retry(core, context, runnable, budget),
        }
    }

    /// Ownership moved between resolution and submission: burn one budget
    /// unit and re-resolve after the backoff, on the always-available global
    /// owner rather than in a tight loop.
    fn schedule_retry(
        self: &Arc<Self>,
        core: Arc<TaskCore>,
        context: TaskContext,
        runnable: SharedTaskFn,
        budget: RetryBudget,
    ) {
        let EngineBinding::Regioned(region) = &self.binding else {
            return;
        };
        let Some((wait_ticks, next_budget)) = budget.consume(&self.retry) else {
            tracing::warn!(
                "⚠️ {} cancelled: dispatch budget exhausted after {} attempts",
                core.id(),
                self.retry.max_attempts + 1,
            );
            core.cancel(CancelReason::DispatchExhausted);
            self.retire(&core);
            return;
        };

        tracing::debug!("🔄 {} owner rejected submission, re-resolving in {wait_ticks}t", core.id());
        let engine = self.clone();
        let retry_core = core.clone();
        let retry: Job = Box::new(move || {
            engine.dispatch_bound(retry_core.clone(), context, runnable.clone(), 0, next_budget);
        });
        let host_id = region.submit_global(retry, wait_ticks, None);
        self.attach(&core, host_id);
    }

    /// Wrap the runnable for direct host submission (global tick engine,
    /// the regioned engine's global owner, or the async facility); the host
    /// primitive drives any repetition itself.
    fn engine_job(self: &Arc<Self>, core: &Arc<TaskCore>, runnable: &SharedTaskFn) -> Job {
        let engine = self.clone();
        let core = core.clone();
        let runnable = runnable.clone();
        Box::new(move || {
            run_once(&engine, &core, &runnable);
        })
    }

    /// Wrap the runnable for one cycle of a context-bound task; a repeating
    /// task chains the next cycle through a fresh resolution.
    fn bound_job(self: &Arc<Self>, core: &Arc<TaskCore>, context: TaskContext, runnable: &SharedTaskFn) -> Job {
        let engine = self.clone();
        let core = core.clone();
        let runnable = runnable.clone();
        Box::new(move || {
            if run_once(&engine, &core, &runnable)
                && let Cadence::EveryTicks(period) = core.cadence()
            {
                engine.dispatch_bound(
                    core.clone(),
                    context,
                    runnable.clone(),
                    period.get(),
                    RetryBudget::fresh(&engine.retry),
                );
            }
        })
    }

    /// Record the live host primitive for a task, closing the race where a
    /// cancel lands between submission and bookkeeping.
    fn attach(&self, core: &Arc<TaskCore>, host_id: HostTaskId) {
        core.set_host_task(host_id);
        if core.state() == TaskState::Cancelled {
            self.retire(core);
        }
    }

    /// Drop a task from the live map, cancelling its host primitive if the
    /// task was cancelled rather than completed.
    pub(crate) fn retire(&self, core: &Arc<TaskCore>) {
        if let Some(host_id) = core.take_host_task()
            && core.state() == TaskState::Cancelled
        {
            self.cancel_host(core.route(), host_id);
        }
        self.tasks.pin().remove(&core.id().0);
    }

    fn cancel_host(&self, route: Route, host_id: HostTaskId) {
        match route {
            Route::Engine => match &self.binding {
                EngineBinding::Global(tick) => tick.cancel(host_id),
                EngineBinding::Regioned(region) => region.cancel(host_id),
            },
            Route::Async => {
                if let Some(async_host) = &self.async_host {
                    async_host.cancel(host_id);
                }
            }
        }
    }

    /// Cancel every live task. Returns how many transitioned.
    pub(crate) fn cancel_all(&self) -> usize {
        let cores: Vec<Arc<TaskCore>> =
            self.tasks.pin().iter().map(|(_, core)| core.clone()).collect();
        let mut cancelled = 0;
        for core in cores {
            if core.cancel(CancelReason::ByCaller) {
                self.retire(&core);
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::info!("🧹 Cancelled {cancelled} live tasks");
        }
        cancelled
    }

    /// Number of tasks currently tracked (scheduled or running).
    pub(crate) fn live_tasks(&self) -> usize {
        self.tasks.pin().len()
    }

    pub(crate) fn kind(&self) -> crate::detect::ExecutionEngine {
        self.binding.kind()
    }
}

/// Execute one cycle: `Scheduled → Running`, invoke, then either re-arm
/// (repeating) or finish. Returns true if another cycle should follow.
fn run_once(engine: &Arc<EngineShared>, core: &Arc<TaskCore>, runnable: &SharedTaskFn) -> bool {
    if !core.try_begin_run() {
        engine.retire(core);
        return false;
    }
    let handle = TaskHandle::new(core.clone(), Arc::downgrade(engine));
    {
        let mut run = runnable.lock().unwrap_or_else(PoisonError::into_inner);
        (*run)(&handle);
    }
    if core.finish_run() {
        true
    } else {
        engine.retire(core);
        false
    }
}
