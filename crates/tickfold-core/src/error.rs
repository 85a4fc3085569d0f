//! Tickfold error taxonomy.

use crate::types::EntityId;

/// Errors surfaced by the scheduler.
///
/// Everything that can go wrong after a successful submission manifests as a
/// terminal `Cancelled` handle state with a reason; these variants are the
/// synchronous failures plus the reasons behind those cancellations.
#[derive(Debug, thiserror::Error)]
pub enum TickfoldError {
    /// Bad caller input, rejected before any dispatch attempt.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// An entity-bound task's target is no longer live.
    #[error("entity {0} is not resolvable to any region owner")]
    EntityNotResolvable(EntityId),

    /// The relocation-retry budget ran out under sustained ownership races.
    #[error("dispatch retry budget exhausted after {attempts} attempts")]
    DispatchExhausted {
        /// Total submission attempts made before giving up.
        attempts: u32,
    },

    /// Neither host engine is reachable. Fatal, startup-only.
    #[error("no host execution engine is reachable")]
    EnvironmentUnavailable,

    /// Configuration could not be loaded or parsed.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience result alias used throughout Tickfold.
pub type Result<T> = std::result::Result<T, TickfoldError>;
