//! Core data model — identities, spatial bindings, and schedule shapes.
//!
//! Everything here is a plain lookup key. A `TaskContext` never owns the
//! entity or location it names; liveness is checked at resolution time,
//! every time.

use std::num::NonZeroU64;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TickfoldError};

/// Length of one scheduler tick.
pub const TICK: Duration = Duration::from_millis(50);

/// Ticks per wall-clock second.
pub const TICKS_PER_SECOND: u64 = 20;

/// Convert a tick count to wall-clock time.
pub fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::from_millis(ticks.saturating_mul(TICK.as_millis() as u64))
}

/// Convert wall-clock time to a tick count (floor, like the host does).
pub fn duration_to_ticks(duration: Duration) -> u64 {
    (duration.as_millis() / TICK.as_millis()) as u64
}

/// Opaque identifier for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Identifier for a live entity in the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity-{}", self.0)
    }
}

/// Identifier for a world/dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldId(pub u64);

/// Identifier for a region owner (a worker thread of the regioned engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "owner-{}", self.0)
    }
}

/// A point in a world, in block coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub world: WorldId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self { world, x, y, z }
    }

    /// The region containing this location. Chunks are 16 blocks wide.
    pub fn region(&self) -> RegionPos {
        RegionPos {
            world: self.world,
            chunk_x: ((self.x.floor() as i64) >> 4) as i32,
            chunk_z: ((self.z.floor() as i64) >> 4) as i32,
        }
    }
}

/// A chunk-granular region address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionPos {
    pub world: WorldId,
    pub chunk_x: i32,
    pub chunk_z: i32,
}

impl RegionPos {
    pub fn new(world: WorldId, chunk_x: i32, chunk_z: i32) -> Self {
        Self { world, chunk_x, chunk_z }
    }
}

/// What a task is bound to. Exactly one variant per submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskContext {
    /// No spatial binding; runs on the global execution owner.
    Global,
    /// Bound to the region containing a location.
    At(Location),
    /// Bound to a region addressed directly by chunk coordinates.
    Region(RegionPos),
    /// Bound to a live entity; follows the entity across regions.
    Entity(EntityId),
}

/// When and how often a task runs, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSpec {
    /// Ticks before the first execution. Zero means the next tick.
    pub delay_ticks: u64,
    /// Period between executions. Absent for one-shot tasks.
    pub period_ticks: Option<NonZeroU64>,
}

impl ScheduleSpec {
    /// Run once, on the next tick.
    pub fn now() -> Self {
        Self { delay_ticks: 0, period_ticks: None }
    }

    /// Run once after `delay_ticks`. Rejects negative delays.
    pub fn delayed(delay_ticks: i64) -> Result<Self> {
        if delay_ticks < 0 {
            return Err(TickfoldError::InvalidSchedule(format!(
                "delay_ticks must be >= 0, got {delay_ticks}"
            )));
        }
        Ok(Self { delay_ticks: delay_ticks as u64, period_ticks: None })
    }

    /// Run after `delay_ticks`, then every `period_ticks`. Rejects negative
    /// delays and non-positive periods.
    pub fn fixed_rate(delay_ticks: i64, period_ticks: i64) -> Result<Self> {
        if delay_ticks < 0 {
            return Err(TickfoldError::InvalidSchedule(format!(
                "delay_ticks must be >= 0, got {delay_ticks}"
            )));
        }
        if period_ticks < 1 {
            return Err(TickfoldError::InvalidSchedule(format!(
                "period_ticks must be >= 1, got {period_ticks}"
            )));
        }
        Ok(Self {
            delay_ticks: delay_ticks as u64,
            period_ticks: NonZeroU64::new(period_ticks as u64),
        })
    }

    /// Whether the task repeats.
    pub fn is_repeating(&self) -> bool {
        self.period_ticks.is_some()
    }
}
