//! Sidecar configuration.
//!
//! Loaded from TOML by the process entry point, validated once at bootstrap
//! and turned into the [`RunParams`] handed to every engine run attempt.

use {
    f3_sidecar_logger::{LoggerConfig, LoggerError},
    f3_sidecar_types::{ChainEpoch, Cid},
    serde::{de::Error as _, Deserialize, Deserializer},
    std::{
        collections::BTreeMap,
        fmt,
        path::{Path, PathBuf},
        time::Duration,
    },
};

/// Retry budget and backoff of the supervised run loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Failed runs tolerated before giving up. The engine is started at
    /// most `max_retries + 1` times.
    pub max_retries: u32,
    /// Flat delay between a failed run and the next attempt, in seconds.
    pub retry_interval_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_interval_secs: 10,
        }
    }
}

impl SupervisorConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

/// Top-level sidecar configuration.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct SidecarConfig {
    /// Host node JSON-RPC endpoint the engine talks to.
    pub rpc_endpoint: String,
    /// Auth token for `rpc_endpoint`.
    pub jwt: String,
    /// Address the sidecar serves its own query API on.
    pub f3_rpc_endpoint: String,
    /// Power table to bootstrap from, if known ahead of time.
    #[serde(default, deserialize_with = "deserialize_optional_cid")]
    pub initial_power_table: Option<Cid>,
    pub bootstrap_epoch: ChainEpoch,
    /// Host chain finality in epochs.
    pub finality: ChainEpoch,
    /// Directory of the engine's datastore.
    pub db_path: PathBuf,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// Per-component log level overrides on top of the default table.
    #[serde(default)]
    pub log_levels: BTreeMap<String, String>,
}

impl fmt::Debug for SidecarConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SidecarConfig")
            .field("rpc_endpoint", &self.rpc_endpoint)
            .field("jwt", &"<redacted>")
            .field("f3_rpc_endpoint", &self.f3_rpc_endpoint)
            .field("initial_power_table", &self.initial_power_table)
            .field("bootstrap_epoch", &self.bootstrap_epoch)
            .field("finality", &self.finality)
            .field("db_path", &self.db_path)
            .field("supervisor", &self.supervisor)
            .field("log_levels", &self.log_levels)
            .finish()
    }
}

/// Errors in sidecar configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("rpc_endpoint must not be empty")]
    EmptyRpcEndpoint,
    #[error("f3_rpc_endpoint must not be empty")]
    EmptySidecarEndpoint,
    #[error("bootstrap_epoch must be >= 0, got {0}")]
    InvalidBootstrapEpoch(ChainEpoch),
    #[error("finality must be > 0, got {0}")]
    InvalidFinality(ChainEpoch),
    #[error("db_path must not be empty")]
    EmptyDbPath,
    #[error("supervisor.retry_interval_secs must be > 0")]
    InvalidRetryInterval,
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Logging(#[from] LoggerError),
}

impl SidecarConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyRpcEndpoint);
        }
        if self.f3_rpc_endpoint.trim().is_empty() {
            return Err(ConfigError::EmptySidecarEndpoint);
        }
        if self.bootstrap_epoch < 0 {
            return Err(ConfigError::InvalidBootstrapEpoch(self.bootstrap_epoch));
        }
        if self.finality <= 0 {
            return Err(ConfigError::InvalidFinality(self.finality));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDbPath);
        }
        if self.supervisor.retry_interval_secs == 0 {
            return Err(ConfigError::InvalidRetryInterval);
        }
        self.logger_config()?;
        Ok(())
    }

    /// The default verbosity table with this configuration's overrides applied.
    pub fn logger_config(&self) -> Result<LoggerConfig, LoggerError> {
        self.log_levels
            .iter()
            .try_fold(LoggerConfig::default(), |config, (component, level)| {
                config.with_component(component, level)
            })
    }

    /// Arguments of a single engine run.
    pub fn run_params(&self) -> RunParams {
        RunParams {
            rpc_endpoint: self.rpc_endpoint.clone(),
            jwt: self.jwt.clone(),
            f3_rpc_endpoint: self.f3_rpc_endpoint.clone(),
            initial_power_table: self.initial_power_table.clone(),
            bootstrap_epoch: self.bootstrap_epoch,
            finality: self.finality,
            db_path: self.db_path.clone(),
        }
    }
}

/// Everything the engine's blocking run entry point takes.
#[derive(Clone, PartialEq, Eq)]
pub struct RunParams {
    pub rpc_endpoint: String,
    pub jwt: String,
    pub f3_rpc_endpoint: String,
    pub initial_power_table: Option<Cid>,
    pub bootstrap_epoch: ChainEpoch,
    pub finality: ChainEpoch,
    pub db_path: PathBuf,
}

impl fmt::Debug for RunParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunParams")
            .field("rpc_endpoint", &self.rpc_endpoint)
            .field("jwt", &"<redacted>")
            .field("f3_rpc_endpoint", &self.f3_rpc_endpoint)
            .field("initial_power_table", &self.initial_power_table)
            .field("bootstrap_epoch", &self.bootstrap_epoch)
            .field("finality", &self.finality)
            .field("db_path", &self.db_path)
            .finish()
    }
}

fn deserialize_optional_cid<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Cid>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(text) if !text.is_empty() => text.parse().map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}
