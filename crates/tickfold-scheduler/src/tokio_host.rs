//! Default async facility — the host's off-engine executor, on tokio.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tickfold_core::error::{Result, TickfoldError};
use tickfold_core::host::{AsyncHost, HostTaskId, Job};
use tokio::task::AbortHandle;

/// [`AsyncHost`] backed by a tokio runtime. Spawned units have no tick or
/// region affinity; cancellation aborts at the next await point, so an
/// execution that already started finishes first.
pub struct TokioAsyncHost {
    runtime: tokio::runtime::Handle,
    handles: Arc<papaya::HashMap<HostTaskId, AbortHandle>>,
    next_id: AtomicU64,
}

impl TokioAsyncHost {
    /// Bind to the current tokio runtime. Fails outside of one.
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| TickfoldError::EnvironmentUnavailable)?;
        Ok(Self::with_handle(runtime))
    }

    /// Bind to an explicit runtime handle.
    pub fn with_handle(runtime: tokio::runtime::Handle) -> Self {
        Self {
            runtime,
            handles: Arc::new(papaya::HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Units still tracked (scheduled or mid-flight).
    pub fn live(&self) -> usize {
        self.handles.pin().len()
    }
}

impl AsyncHost for TokioAsyncHost {
    fn spawn(&self, mut job: Job, initial: Duration, period: Option<Duration>) -> HostTaskId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handles = self.handles.clone();
        let task = self.runtime.spawn(async move {
            if !initial.is_zero() {
                tokio::time::sleep(initial).await;
            }
            match period {
                None => {
                    job();
                    handles.pin().remove(&id);
                }
                Some(period) => loop {
                    job();
                    tokio::time::sleep(period).await;
                },
            }
        });
        self.handles.pin().insert(id, task.abort_handle());
        id
    }

    fn cancel(&self, id: HostTaskId) {
        if let Some(handle) = self.handles.pin().remove(&id) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;

    #[tokio::test]
    async fn test_one_shot_runs_and_untracks() {
        let host = TokioAsyncHost::new().unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        host.spawn(
            Box::new(move || {
                flag.store(true, Ordering::Relaxed);
            }),
            Duration::ZERO,
            None,
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(ran.load(Ordering::Relaxed));
        assert_eq!(host.live(), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_delay_elapses() {
        let host = TokioAsyncHost::new().unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let id = host.spawn(
            Box::new(move || {
                flag.store(true, Ordering::Relaxed);
            }),
            Duration::from_secs(60),
            None,
        );

        host.cancel(id);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!ran.load(Ordering::Relaxed));
        assert_eq!(host.live(), 0);
    }

    #[tokio::test]
    async fn test_repeating_fires_until_cancel() {
        let host = TokioAsyncHost::new().unwrap();
        let runs = Arc::new(AtomicU64::new(0));
        let counter = runs.clone();
        let id = host.spawn(
            Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
            Duration::ZERO,
            Some(Duration::from_millis(10)),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        host.cancel(id);
        // Let any in-flight run drain before sampling.
        tokio::time::sleep(Duration::from_millis(30)).await;
        let after_cancel = runs.load(Ordering::Relaxed);
        assert!(after_cancel >= 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::Relaxed), after_cancel);
    }
}
