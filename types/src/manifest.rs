//! The consensus manifest: parameters of the running network.

use {
    crate::{
        cid::Cid,
        power::PowerEntry,
        tipset::ChainEpoch,
    },
    serde::{Deserialize, Serialize},
};

/// Chain-facing parameters of the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EcConfig {
    /// Expected block interval in seconds.
    pub period_secs: u64,
    /// Number of epochs after which the host chain considers a tipset final.
    pub finality: ChainEpoch,
    pub delay_multiplier: f64,
    pub base_decision_backoff_table: Vec<f64>,
    pub head_lookback: ChainEpoch,
    /// Whether decided tipsets are handed back to the host for finalization.
    pub finalize: bool,
}

/// Snapshot of the active consensus configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
    pub pause: bool,
    pub protocol_version: u64,
    pub initial_instance: u64,
    pub bootstrap_epoch: ChainEpoch,
    pub network_name: String,
    pub explicit_power: Vec<PowerEntry>,
    pub ignore_ec_power: bool,
    /// CID of the power table the network bootstrapped from. May still be
    /// undefined when the manifest is snapshotted before bootstrap.
    #[serde(default)]
    pub initial_power_table: Option<Cid>,
    pub committee_lookback: u64,
    #[serde(rename = "EC")]
    pub ec: EcConfig,
}

impl Manifest {
    pub fn has_initial_power_table(&self) -> bool {
        self.initial_power_table.is_some()
    }
}
