//! Host engine traits — the narrow interfaces Tickfold consumes.
//!
//! The host process owns the actual tick loop and region worker threads;
//! Tickfold only ever enqueues through these traits and cancels by id. All
//! methods are non-blocking enqueue operations, callable from any thread.

use std::num::NonZeroU64;
use std::time::Duration;

use crate::types::{EntityId, OwnerId, RegionPos};

/// Identifier the host hands back for a scheduled unit. Opaque to callers;
/// the dispatch engine exclusively owns the mapping from task handles to
/// these ids.
pub type HostTaskId = u64;

/// A unit of work handed to a host primitive. Repeating primitives invoke it
/// once per period.
pub type Job = Box<dyn FnMut() + Send + 'static>;

/// Submission refused because region ownership changed between resolution
/// and submission. Consumed by the relocation-retry protocol; never surfaced
/// to callers directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitRejected;

impl std::fmt::Display for SubmitRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("owner rejected submission")
    }
}

/// The global single-threaded tick engine.
///
/// Submissions cannot be rejected: there is a single owner and no migration.
pub trait TickHost: Send + Sync {
    /// Enqueue `job` to run after `delay_ticks`, repeating every
    /// `period_ticks` if present.
    fn submit(&self, job: Job, delay_ticks: u64, period_ticks: Option<NonZeroU64>) -> HostTaskId;

    /// Cancel a previously submitted unit. Idempotent.
    fn cancel(&self, id: HostTaskId);
}

/// The region-partitioned threaded engine.
pub trait RegionHost: Send + Sync {
    /// The owner currently responsible for a region. Ownership can change
    /// between calls; never cache the answer.
    fn owner_at(&self, region: RegionPos) -> OwnerId;

    /// The owner currently holding a live entity, or `None` if the entity
    /// is removed, never existed, or is transiently unresolvable.
    fn owner_of(&self, entity: EntityId) -> Option<OwnerId>;

    /// Enqueue `job` on a specific owner. Fails with [`SubmitRejected`] if
    /// that owner no longer holds the region — the race inherent to
    /// concurrent region migration.
    fn submit_to(
        &self,
        owner: OwnerId,
        job: Job,
        delay_ticks: u64,
        period_ticks: Option<NonZeroU64>,
    ) -> Result<HostTaskId, SubmitRejected>;

    /// Enqueue `job` on the engine's distinguished global owner. Always
    /// accepted; the global owner does not migrate.
    fn submit_global(&self, job: Job, delay_ticks: u64, period_ticks: Option<NonZeroU64>)
    -> HostTaskId;

    /// Cancel a previously submitted unit. Idempotent.
    fn cancel(&self, id: HostTaskId);
}

/// The host's general-purpose asynchronous execution facility. No tick or
/// region affinity; submissions cannot race on ownership.
pub trait AsyncHost: Send + Sync {
    /// Run `job` off-engine after `initial`, repeating every `period` if
    /// present.
    fn spawn(&self, job: Job, initial: Duration, period: Option<Duration>) -> HostTaskId;

    /// Cancel a previously spawned unit. Idempotent.
    fn cancel(&self, id: HostTaskId);
}
