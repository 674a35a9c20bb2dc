//! Bootstrap errors.

use crate::{capabilities::ContractError, config::ConfigError};

/// Failures that abort the sidecar before, or while, starting the engine.
/// None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum SidecarError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to construct finality engine: {0:#}")]
    EngineConstruction(anyhow::Error),

    #[error("failed to spawn supervisor thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SidecarError>;
