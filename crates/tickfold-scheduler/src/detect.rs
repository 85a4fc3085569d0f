//! Environment detection — which host engine is this process running?
//!
//! Decided once, at scheduler construction, from the capabilities the
//! embedder hands over. The regioned engine's presence is the marker: a host
//! that exposes region primitives is regioned, everything else falls back to
//! the global tick loop. Immutable afterwards; every dispatch decision is a
//! pure function of this value plus the task's context.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tickfold_core::error::{Result, TickfoldError};
use tickfold_core::host::{AsyncHost, RegionHost, TickHost};

/// Which execution engine the host process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionEngine {
    /// Single global tick-loop scheduler.
    Global,
    /// Region-partitioned, multi-threaded scheduler.
    Regioned,
}

impl ExecutionEngine {
    pub fn is_regioned(&self) -> bool {
        matches!(self, ExecutionEngine::Regioned)
    }
}

impl std::fmt::Display for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionEngine::Global => write!(f, "global"),
            ExecutionEngine::Regioned => write!(f, "regioned"),
        }
    }
}

/// The host primitives reachable from this process, as supplied by the
/// embedder. At most one of the two engines is consulted; supplying both
/// means the regioned engine wins (its presence is the marker capability).
#[derive(Clone, Default)]
pub struct HostCaps {
    pub tick: Option<Arc<dyn TickHost>>,
    pub region: Option<Arc<dyn RegionHost>>,
    pub async_host: Option<Arc<dyn AsyncHost>>,
}

impl HostCaps {
    /// Capabilities of a global tick-loop host.
    pub fn global(tick: Arc<dyn TickHost>) -> Self {
        Self { tick: Some(tick), region: None, async_host: None }
    }

    /// Capabilities of a region-threaded host.
    pub fn regioned(region: Arc<dyn RegionHost>) -> Self {
        Self { tick: None, region: Some(region), async_host: None }
    }

    /// Attach the host's asynchronous execution facility.
    pub fn with_async(mut self, async_host: Arc<dyn AsyncHost>) -> Self {
        self.async_host = Some(async_host);
        self
    }
}

/// The engine the detector bound to. Closed over exhaustively at every
/// dispatch decision point.
#[derive(Clone)]
pub enum EngineBinding {
    Global(Arc<dyn TickHost>),
    Regioned(Arc<dyn RegionHost>),
}

impl std::fmt::Debug for EngineBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineBinding::Global(_) => f.write_str("EngineBinding::Global"),
            EngineBinding::Regioned(_) => f.write_str("EngineBinding::Regioned"),
        }
    }
}

impl EngineBinding {
    pub fn kind(&self) -> ExecutionEngine {
        match self {
            EngineBinding::Global(_) => ExecutionEngine::Global,
            EngineBinding::Regioned(_) => ExecutionEngine::Regioned,
        }
    }
}

/// Probe the supplied capabilities and bind to an engine.
///
/// Fails only when neither engine's primitives are reachable, which means
/// the host collaborator contract is broken — there is nothing to retry.
pub fn detect(caps: &HostCaps) -> Result<EngineBinding> {
    if let Some(region) = &caps.region {
        tracing::info!("⏰ Region-threaded engine detected");
        return Ok(EngineBinding::Regioned(region.clone()));
    }
    if let Some(tick) = &caps.tick {
        tracing::info!("⏰ Global tick engine detected");
        return Ok(EngineBinding::Global(tick.clone()));
    }
    Err(TickfoldError::EnvironmentUnavailable)
}
