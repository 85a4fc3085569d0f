//! The folded scheduler — one scheduling API over both host engines.

use std::sync::Arc;
use std::time::Duration;

use tickfold_core::config::SchedulerConfig;
use tickfold_core::error::{Result, TickfoldError};
use tickfold_core::types::{ScheduleSpec, TaskContext};

use crate::detect::{ExecutionEngine, HostCaps, detect};
use crate::dispatch::EngineShared;
use crate::handle::TaskHandle;

/// The single public entry point: detects the host engine once at
/// construction, then routes every submission through the dispatch engine.
/// Cheap to clone and safe to share; submissions may come from any thread.
#[derive(Clone)]
pub struct FoldedScheduler {
    inner: Arc<EngineShared>,
}

impl FoldedScheduler {
    /// Detect the host engine and build a scheduler with default config.
    pub fn new(caps: HostCaps) -> Result<Self> {
        Self::with_config(caps, SchedulerConfig::default())
    }

    /// Detect the host engine and build a scheduler with explicit config.
    pub fn with_config(caps: HostCaps, config: SchedulerConfig) -> Result<Self> {
        config.retry.validate()?;
        let binding = detect(&caps)?;
        Ok(Self { inner: EngineShared::new(binding, caps.async_host, config.retry) })
    }

    /// Which engine this process runs. Fixed for the scheduler's lifetime.
    pub fn engine(&self) -> ExecutionEngine {
        self.inner.kind()
    }

    /// Run once on the next tick of the context's owner.
    pub fn run_now(
        &self,
        context: TaskContext,
        runnable: impl FnMut(&TaskHandle) + Send + 'static,
    ) -> TaskHandle {
        self.inner.submit(context, ScheduleSpec::now(), runnable)
    }

    /// Run once after `delay_ticks`. Fails fast with
    /// [`TickfoldError::InvalidSchedule`] on a negative delay.
    pub fn run_delayed(
        &self,
        context: TaskContext,
        delay_ticks: i64,
        runnable: impl FnMut(&TaskHandle) + Send + 'static,
    ) -> Result<TaskHandle> {
        let spec = ScheduleSpec::delayed(delay_ticks)?;
        Ok(self.inner.submit(context, spec, runnable))
    }

    /// Run after `delay_ticks`, then every `period_ticks`, until cancelled.
    pub fn run_at_fixed_rate(
        &self,
        context: TaskContext,
        delay_ticks: i64,
        period_ticks: i64,
        runnable: impl FnMut(&TaskHandle) + Send + 'static,
    ) -> Result<TaskHandle> {
        let spec = ScheduleSpec::fixed_rate(delay_ticks, period_ticks)?;
        Ok(self.inner.submit(context, spec, runnable))
    }

    /// Fire-and-forget immediate submission; no handle.
    pub fn execute(&self, context: TaskContext, runnable: impl FnOnce() + Send + 'static) {
        let mut runnable = Some(runnable);
        let _ = self.run_now(context, move |_| {
            if let Some(run) = runnable.take() {
                run();
            }
        });
    }

    /// Run once on the async facility, immediately.
    pub fn run_async_now(
        &self,
        runnable: impl FnMut(&TaskHandle) + Send + 'static,
    ) -> Result<TaskHandle> {
        self.inner.submit_async(Duration::ZERO, None, runnable)
    }

    /// Run once on the async facility after `initial`.
    pub fn run_async_delayed(
        &self,
        initial: Duration,
        runnable: impl FnMut(&TaskHandle) + Send + 'static,
    ) -> Result<TaskHandle> {
        self.inner.submit_async(initial, None, runnable)
    }

    /// Run on the async facility after `initial`, then every `period`.
    pub fn run_async_at_fixed_rate(
        &self,
        initial: Duration,
        period: Duration,
        runnable: impl FnMut(&TaskHandle) + Send + 'static,
    ) -> Result<TaskHandle> {
        if period.is_zero() {
            return Err(TickfoldError::InvalidSchedule("async period must be non-zero".into()));
        }
        self.inner.submit_async(initial, Some(period), runnable)
    }

    /// Cancel every task this scheduler still tracks. Returns how many
    /// transitioned to `Cancelled`.
    pub fn cancel_all(&self) -> usize {
        self.inner.cancel_all()
    }

    /// Tasks currently scheduled or running.
    pub fn live_tasks(&self) -> usize {
        self.inner.live_tasks()
    }
}

impl std::fmt::Debug for FoldedScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FoldedScheduler")
            .field("engine", &self.engine())
            .field("live_tasks", &self.live_tasks())
            .finish()
    }
}
