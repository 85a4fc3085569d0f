//! Task context resolution — which execution owner runs this task, now?
//!
//! Pure lookup, no caching: region ownership changes as entities move and
//! regions split or merge, so the answer is only good for the submission it
//! was computed for. Repeating context-bound tasks resolve again on every
//! cycle.

use tickfold_core::error::{Result, TickfoldError};
use tickfold_core::types::{OwnerId, TaskContext};

use crate::detect::EngineBinding;

/// The concrete execution owner a submission resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// The single owner of the global tick engine.
    GlobalTick,
    /// The regioned engine's distinguished global owner.
    RegionGlobal,
    /// A specific region owner of the regioned engine.
    Owner(OwnerId),
}

/// Resolve `context` to an execution owner under the detected engine.
///
/// Under the global engine every context collapses to the tick thread —
/// there is nothing to regionize, so entity liveness is not checked. Under
/// the regioned engine an entity that is no longer live fails with
/// [`TickfoldError::EntityNotResolvable`]; locations always resolve.
pub fn resolve(binding: &EngineBinding, context: &TaskContext) -> Result<ResolvedTarget> {
    match binding {
        EngineBinding::Global(_) => Ok(ResolvedTarget::GlobalTick),
        EngineBinding::Regioned(region) => match context {
            TaskContext::Global => Ok(ResolvedTarget::RegionGlobal),
            TaskContext::At(location) => Ok(ResolvedTarget::Owner(region.owner_at(location.region()))),
            TaskContext::Region(pos) => Ok(ResolvedTarget::Owner(region.owner_at(*pos))),
            TaskContext::Entity(entity) => region
                .owner_of(*entity)
                .map(ResolvedTarget::Owner)
                .ok_or(TickfoldError::EntityNotResolvable(*entity)),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tickfold_core::types::{EntityId, Location, RegionPos, WorldId};

    use super::*;
    use crate::sim::{SimRegionHost, SimTickHost};

    fn regioned() -> (Arc<SimRegionHost>, EngineBinding) {
        let host = Arc::new(SimRegionHost::new());
        (host.clone(), EngineBinding::Regioned(host))
    }

    #[test]
    fn test_global_engine_collapses_everything() {
        let binding = EngineBinding::Global(Arc::new(SimTickHost::new()));
        for ctx in [
            TaskContext::Global,
            TaskContext::At(Location::new(WorldId(0), 100.0, 64.0, -30.0)),
            TaskContext::Entity(EntityId(9)),
        ] {
            assert_eq!(resolve(&binding, &ctx).unwrap(), ResolvedTarget::GlobalTick);
        }
    }

    #[test]
    fn test_location_resolves_to_region_owner() {
        let (host, binding) = regioned();
        let region = RegionPos::new(WorldId(0), 2, -1);
        host.assign_region(region, OwnerId(7));

        let at = TaskContext::At(Location::new(WorldId(0), 40.0, 64.0, -3.0));
        assert_eq!(resolve(&binding, &at).unwrap(), ResolvedTarget::Owner(OwnerId(7)));
        let direct = TaskContext::Region(region);
        assert_eq!(resolve(&binding, &direct).unwrap(), ResolvedTarget::Owner(OwnerId(7)));
    }

    #[test]
    fn test_entity_follows_current_owner() {
        let (host, binding) = regioned();
        let entity = EntityId(4);
        host.place_entity(entity, OwnerId(1));
        let ctx = TaskContext::Entity(entity);

        assert_eq!(resolve(&binding, &ctx).unwrap(), ResolvedTarget::Owner(OwnerId(1)));

        // Not cached: moving the entity changes the next resolution.
        host.move_entity(entity, OwnerId(2));
        assert_eq!(resolve(&binding, &ctx).unwrap(), ResolvedTarget::Owner(OwnerId(2)));
    }

    #[test]
    fn test_dead_entity_is_not_resolvable() {
        let (host, binding) = regioned();
        let entity = EntityId(4);
        host.place_entity(entity, OwnerId(1));
        host.remove_entity(entity);

        let err = resolve(&binding, &TaskContext::Entity(entity)).unwrap_err();
        assert!(matches!(err, TickfoldError::EntityNotResolvable(e) if e == entity));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let (host, binding) = regioned();
        host.place_entity(EntityId(4), OwnerId(3));
        let ctx = TaskContext::Entity(EntityId(4));
        let first = resolve(&binding, &ctx).unwrap();
        for _ in 0..10 {
            assert_eq!(resolve(&binding, &ctx).unwrap(), first);
        }
    }
}
