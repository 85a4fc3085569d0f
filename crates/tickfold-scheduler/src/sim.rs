//! Simulated hosts — deterministic manual-tick engines for tests and dry
//! runs.
//!
//! `advance(n)` plays n ticks: due jobs run inline on the caller's thread,
//! outside the sim's own lock, so a job may freely submit or cancel against
//! the same host. The region sim additionally models entity placement and
//! movement, region ownership, and forced submission rejection — everything
//! the relocation-retry protocol needs exercised.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tickfold_core::host::{HostTaskId, Job, RegionHost, SubmitRejected, TickHost};
use tickfold_core::types::{EntityId, OwnerId, RegionPos};

/// The regioned sim's distinguished global owner.
pub const GLOBAL_OWNER: OwnerId = OwnerId(u64::MAX);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SimJob {
    id: HostTaskId,
    due: u64,
    period: Option<NonZeroU64>,
    owner: OwnerId,
    job: Arc<Mutex<Job>>,
    dead: bool,
}

/// Job table shared by both sims.
struct SimCore {
    now: u64,
    next_id: HostTaskId,
    jobs: Vec<SimJob>,
}

impl SimCore {
    fn new() -> Self {
        Self { now: 0, next_id: 0, jobs: Vec::new() }
    }

    fn submit(
        &mut self,
        owner: OwnerId,
        job: Job,
        delay_ticks: u64,
        period_ticks: Option<NonZeroU64>,
    ) -> HostTaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.jobs.push(SimJob {
            id,
            due: self.now + delay_ticks,
            period: period_ticks,
            owner,
            job: Arc::new(Mutex::new(job)),
            dead: false,
        });
        id
    }

    fn cancel(&mut self, id: HostTaskId) {
        if let Some(entry) = self.jobs.iter_mut().find(|j| j.id == id) {
            entry.dead = true;
        }
    }

    /// Jobs firing this tick. One-shots are consumed; periodics re-arm.
    fn due_jobs(&mut self) -> Vec<(Arc<Mutex<Job>>, OwnerId)> {
        let now = self.now;
        let mut fire = Vec::new();
        for entry in self.jobs.iter_mut() {
            if !entry.dead && entry.due <= now {
                fire.push((entry.job.clone(), entry.owner));
                match entry.period {
                    Some(period) => entry.due = now + period.get(),
                    None => entry.dead = true,
                }
            }
        }
        self.jobs.retain(|j| !j.dead);
        fire
    }

    fn pending(&self) -> usize {
        self.jobs.iter().filter(|j| !j.dead).count()
    }
}

/// Simulated global tick-loop engine.
pub struct SimTickHost {
    inner: Mutex<SimCore>,
}

impl SimTickHost {
    pub fn new() -> Self {
        Self { inner: Mutex::new(SimCore::new()) }
    }

    /// Play `ticks` ticks, running due jobs inline.
    pub fn advance(&self, ticks: u64) {
        for _ in 0..ticks {
            let fire = lock(&self.inner).due_jobs();
            for (job, _) in fire {
                let mut job = lock(&job);
                (*job)();
            }
            lock(&self.inner).now += 1;
        }
    }

    /// The current tick.
    pub fn now(&self) -> u64 {
        lock(&self.inner).now
    }

    /// Units still queued on the host.
    pub fn pending(&self) -> usize {
        lock(&self.inner).pending()
    }
}

impl Default for SimTickHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TickHost for SimTickHost {
    fn submit(&self, job: Job, delay_ticks: u64, period_ticks: Option<NonZeroU64>) -> HostTaskId {
        lock(&self.inner).submit(GLOBAL_OWNER, job, delay_ticks, period_ticks)
    }

    fn cancel(&self, id: HostTaskId) {
        lock(&self.inner).cancel(id);
    }
}

struct RegionSim {
    core: SimCore,
    region_owner: HashMap<RegionPos, OwnerId>,
    entity_owner: HashMap<EntityId, OwnerId>,
    rejecting: HashSet<OwnerId>,
    rejections: u64,
    run_log: Vec<(u64, OwnerId)>,
}

/// Simulated region-threaded engine. Single-threaded under `advance`, but
/// the ownership model and rejection injection reproduce the races the
/// dispatch engine must survive.
pub struct SimRegionHost {
    inner: Mutex<RegionSim>,
}

impl SimRegionHost {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegionSim {
                core: SimCore::new(),
                region_owner: HashMap::new(),
                entity_owner: HashMap::new(),
                rejecting: HashSet::new(),
                rejections: 0,
                run_log: Vec::new(),
            }),
        }
    }

    /// Play `ticks` ticks, running due jobs inline on their owner lane.
    pub fn advance(&self, ticks: u64) {
        for _ in 0..ticks {
            let fire = {
                let mut sim = lock(&self.inner);
                let due = sim.core.due_jobs();
                let now = sim.core.now;
                for (_, owner) in &due {
                    sim.run_log.push((now, *owner));
                }
                due
            };
            for (job, _) in fire {
                let mut job = lock(&job);
                (*job)();
            }
            lock(&self.inner).core.now += 1;
        }
    }

    /// The current tick.
    pub fn now(&self) -> u64 {
        lock(&self.inner).core.now
    }

    /// Units still queued on the host.
    pub fn pending(&self) -> usize {
        lock(&self.inner).core.pending()
    }

    /// Assign a region to an owner. Unassigned regions belong to owner 0.
    pub fn assign_region(&self, region: RegionPos, owner: OwnerId) {
        lock(&self.inner).region_owner.insert(region, owner);
    }

    /// Make an entity live on an owner.
    pub fn place_entity(&self, entity: EntityId, owner: OwnerId) {
        lock(&self.inner).entity_owner.insert(entity, owner);
    }

    /// Migrate a live entity to another owner.
    pub fn move_entity(&self, entity: EntityId, owner: OwnerId) {
        lock(&self.inner).entity_owner.insert(entity, owner);
    }

    /// Remove an entity; it stops resolving.
    pub fn remove_entity(&self, entity: EntityId) {
        lock(&self.inner).entity_owner.remove(&entity);
    }

    /// Force an owner to reject submissions, modelling mid-migration churn.
    pub fn set_rejecting(&self, owner: OwnerId, rejecting: bool) {
        let mut sim = lock(&self.inner);
        if rejecting {
            sim.rejecting.insert(owner);
        } else {
            sim.rejecting.remove(&owner);
        }
    }

    /// Total submissions rejected so far.
    pub fn rejections(&self) -> u64 {
        lock(&self.inner).rejections
    }

    /// Every execution so far, as (tick, owner) pairs. Retry control jobs
    /// show up under [`GLOBAL_OWNER`].
    pub fn run_log(&self) -> Vec<(u64, OwnerId)> {
        lock(&self.inner).run_log.clone()
    }
}

impl Default for SimRegionHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionHost for SimRegionHost {
    fn owner_at(&self, region: RegionPos) -> OwnerId {
        lock(&self.inner).region_owner.get(&region).copied().unwrap_or(OwnerId(0))
    }

    fn owner_of(&self, entity: EntityId) -> Option<OwnerId> {
        lock(&self.inner).entity_owner.get(&entity).copied()
    }

    fn submit_to(
        &self,
        owner: OwnerId,
        job: Job,
        delay_ticks: u64,
        period_ticks: Option<NonZeroU64>,
    ) -> Result<HostTaskId, SubmitRejected> {
        let mut sim = lock(&self.inner);
        if sim.rejecting.contains(&owner) {
            sim.rejections += 1;
            return Err(SubmitRejected);
        }
        Ok(sim.core.submit(owner, job, delay_ticks, period_ticks))
    }

    fn submit_global(
        &self,
        job: Job,
        delay_ticks: u64,
        period_ticks: Option<NonZeroU64>,
    ) -> HostTaskId {
        lock(&self.inner).core.submit(GLOBAL_OWNER, job, delay_ticks, period_ticks)
    }

    fn cancel(&self, id: HostTaskId) {
        lock(&self.inner).core.cancel(id);
    }
}
