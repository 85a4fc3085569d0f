//! # Tickfold Scheduler
//!
//! Engine-folding task dispatch: submit delayed, repeating, and immediate
//! work without knowing whether the host runs a single global tick loop or
//! a region-partitioned, multi-threaded scheduler.
//!
//! ## Architecture
//! ```text
//! FoldedScheduler (facade, validates & folds)
//!   ├── detect:   which engine is this process running? (once, immutable)
//!   ├── resolve:  context → current execution owner (pure, never cached)
//!   ├── dispatch: route to host primitive + relocation-retry protocol
//!   │               ├── Global engine   → direct submission, no races
//!   │               ├── Regioned engine → resolve → submit → bounded
//!   │               │     backoff retry on ownership rejection
//!   │               └── Async           → off-engine, no affinity
//!   └── handle:   uniform Scheduled/Running/Completed/Cancelled surface
//! ```
//!
//! A task bound to a live entity eventually executes exactly once per
//! intended invocation, on the owner that actually holds the entity; a task
//! bound to a dead entity is cancelled with a reason, never silently
//! retried forever.

pub mod detect;
mod dispatch;
pub mod facade;
pub mod handle;
pub mod resolve;
pub mod sim;
pub mod tokio_host;

pub use detect::{EngineBinding, ExecutionEngine, HostCaps, detect};
pub use facade::FoldedScheduler;
pub use handle::{CancelReason, TaskHandle, TaskState};
pub use resolve::{ResolvedTarget, resolve};
pub use sim::{SimRegionHost, SimTickHost};
pub use tokio_host::TokioAsyncHost;

pub use tickfold_core::config::{RetryConfig, SchedulerConfig};
pub use tickfold_core::error::{Result, TickfoldError};
pub use tickfold_core::types::{
    EntityId, Location, OwnerId, RegionPos, ScheduleSpec, TaskContext, TaskId, WorldId,
};
