//! The seam to the finality engine.
//!
//! The engine itself (consensus, networking, certificate exchange) lives
//! outside this crate. The sidecar only needs a blocking run entry point and
//! a set of thread-safe read accessors, plus a factory that builds an engine
//! from a validated capability contract.

use {
    crate::{capabilities::HostCapabilities, config::RunParams},
    f3_sidecar_types::{FinalityCertificate, InstanceProgress, Manifest, PowerEntries, TipSetKey},
    std::sync::Arc,
};

/// Engine failures are opaque to the sidecar.
pub type EngineResult<T> = anyhow::Result<T>;

/// A constructed finality engine.
///
/// Read accessors may be called from any thread while [`run`] is blocking
/// on another; implementations return consistent snapshots.
///
/// [`run`]: FinalityEngine::run
pub trait FinalityEngine: Send + Sync {
    /// Participate in consensus until the engine stops. Blocks the calling
    /// thread. `Ok(())` means the engine exited cleanly.
    fn run(&self, params: &RunParams) -> EngineResult<()>;

    fn certificate(&self, instance: u64) -> EngineResult<FinalityCertificate>;

    /// The most recent certificate; an error if none has been produced yet.
    fn latest_certificate(&self) -> EngineResult<FinalityCertificate>;

    fn power_table(&self, key: &TipSetKey) -> EngineResult<PowerEntries>;

    fn power_table_by_instance(&self, instance: u64) -> EngineResult<PowerEntries>;

    fn is_running(&self) -> bool;

    fn progress(&self) -> InstanceProgress;

    fn manifest(&self) -> Manifest;
}

/// Builds an engine bound to a host's capabilities.
pub trait EngineFactory {
    type Engine: FinalityEngine + 'static;

    fn create(&self, capabilities: Arc<dyn HostCapabilities>) -> EngineResult<Self::Engine>;
}
