//! F3 finality sidecar core.
//!
//! Bridges a host node to a long-running finality engine:
//!
//! 1. **Capability contract**: the host supplies every operation the engine
//!    needs to observe and act on the chain ([`capabilities`]). An incomplete
//!    contract is rejected before the engine is constructed.
//! 2. **Supervisor**: drives the engine's blocking run entry point on a
//!    dedicated thread, retrying transient failures with a flat backoff up to
//!    a fixed budget ([`supervisor`]).
//! 3. **Query facade**: read-only, concurrency-safe access to certificates,
//!    power tables, progress and the manifest ([`query`]).
//!
//! ```text
//!  host ──▶ CapabilityContract ──▶ EngineFactory ──▶ Arc<Engine>
//!                                                     │      │
//!                                      Supervisor ◀───┘      └───▶ QueryFacade ◀── host RPC
//!                                   (run, retry, backoff)          (read-only)
//! ```

pub mod capabilities;
pub mod config;
pub mod engine;
pub mod error;
pub mod query;
pub mod sidecar;
pub mod supervisor;
#[cfg(any(test, feature = "dev-context-only-utils"))]
pub mod test_utils;

pub use capabilities::{
    CapabilityContract, CapabilityContractBuilder, CapabilityName, CapabilityResult,
    ContractError, HostCapabilities,
};
pub use config::{ConfigError, RunParams, SidecarConfig, SupervisorConfig};
pub use engine::{EngineFactory, EngineResult, FinalityEngine};
pub use error::SidecarError;
pub use query::QueryFacade;
pub use sidecar::Sidecar;
pub use supervisor::{
    Backoff, RunOutcome, SleepBackoff, Supervisor, SupervisorHandle, SupervisorReport,
    SupervisorState, SupervisorStatus,
};
