//! # Tickfold Core
//!
//! Shared foundation for the Tickfold scheduler: the data model (task
//! contexts, schedule shapes, identities), the host engine traits the
//! dispatch layer consumes, the error taxonomy, and configuration.
//!
//! This crate deliberately knows nothing about dispatch strategy — it only
//! defines what the host looks like and what callers may ask for.

pub mod config;
pub mod error;
pub mod host;
pub mod types;

pub use config::{RetryConfig, SchedulerConfig};
pub use error::{Result, TickfoldError};
pub use host::{AsyncHost, HostTaskId, Job, RegionHost, SubmitRejected, TickHost};
pub use types::{
    EntityId, Location, OwnerId, RegionPos, ScheduleSpec, TICK, TICKS_PER_SECOND, TaskContext,
    TaskId, WorldId, duration_to_ticks, ticks_to_duration,
};
