//! Host capability contract.
//!
//! The finality engine cannot see the chain on its own: it calls back into
//! the host for tipsets, power tables, signing, peer protection and
//! finalization. [`HostCapabilities`] names every such operation. A host can
//! implement the trait directly, or bind one closure per operation through
//! [`CapabilityContractBuilder`], whose [`build`] rejects any contract with
//! an unbound operation.
//!
//! [`build`]: CapabilityContractBuilder::build

use {
    f3_sidecar_types::{
        ActorId, AddrInfo, ChainEpoch, PeerId, PowerEntries, Signature, TipSet, TipSetKey,
        VersionInfo,
    },
    std::fmt,
};

/// Failures of host operations are opaque to the sidecar and handed to the
/// engine as-is.
pub type CapabilityResult<T> = anyhow::Result<T>;

/// Operations the host must supply before the engine can start.
pub trait HostCapabilities: Send + Sync {
    /// Raw network name, e.g. `calibrationnet`.
    fn network_name(&self) -> CapabilityResult<String>;
    fn tipset_by_epoch(&self, epoch: ChainEpoch) -> CapabilityResult<TipSet>;
    fn tipset(&self, key: &TipSetKey) -> CapabilityResult<TipSet>;
    fn head(&self) -> CapabilityResult<TipSet>;
    fn parent(&self, key: &TipSetKey) -> CapabilityResult<TipSet>;
    fn power_table(&self, key: &TipSetKey) -> CapabilityResult<PowerEntries>;
    /// Ask the host's peer manager to keep a connection to `peer` open.
    fn protect_peer(&self, peer: &PeerId) -> CapabilityResult<bool>;
    /// Miner actors this node signs for.
    fn participating_miner_ids(&self) -> CapabilityResult<Vec<ActorId>>;
    fn sign_message(&self, signer: &[u8], message: &[u8]) -> CapabilityResult<Signature>;
    fn finalize(&self, key: &TipSetKey) -> CapabilityResult<()>;
    fn version(&self) -> CapabilityResult<VersionInfo>;
    fn net_addrs_listen(&self) -> CapabilityResult<AddrInfo>;
}

/// Names of the contract's operations, as reported in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityName {
    NetworkName,
    TipSetByEpoch,
    TipSet,
    Head,
    Parent,
    PowerTable,
    ProtectPeer,
    ParticipatingMinerIds,
    SignMessage,
    Finalize,
    Version,
    NetAddrsListen,
}

impl CapabilityName {
    pub const ALL: [CapabilityName; 12] = [
        CapabilityName::NetworkName,
        CapabilityName::TipSetByEpoch,
        CapabilityName::TipSet,
        CapabilityName::Head,
        CapabilityName::Parent,
        CapabilityName::PowerTable,
        CapabilityName::ProtectPeer,
        CapabilityName::ParticipatingMinerIds,
        CapabilityName::SignMessage,
        CapabilityName::Finalize,
        CapabilityName::Version,
        CapabilityName::NetAddrsListen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityName::NetworkName => "GetRawNetworkName",
            CapabilityName::TipSetByEpoch => "GetTipsetByEpoch",
            CapabilityName::TipSet => "GetTipset",
            CapabilityName::Head => "GetHead",
            CapabilityName::Parent => "GetParent",
            CapabilityName::PowerTable => "GetPowerTable",
            CapabilityName::ProtectPeer => "ProtectPeer",
            CapabilityName::ParticipatingMinerIds => "GetParticipatingMinerIDs",
            CapabilityName::SignMessage => "SignMessage",
            CapabilityName::Finalize => "Finalize",
            CapabilityName::Version => "Version",
            CapabilityName::NetAddrsListen => "NetAddrsListen",
        }
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configuration defect in the capability contract. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("capability contract incomplete, unbound: {}", join_names(.missing))]
    Incomplete { missing: Vec<CapabilityName> },
}

fn join_names(names: &[CapabilityName]) -> String {
    names
        .iter()
        .map(CapabilityName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

type Nullary<T> = Box<dyn Fn() -> CapabilityResult<T> + Send + Sync>;
type ByKey<T> = Box<dyn Fn(&TipSetKey) -> CapabilityResult<T> + Send + Sync>;
type ByEpoch = Box<dyn Fn(ChainEpoch) -> CapabilityResult<TipSet> + Send + Sync>;
type ByPeer = Box<dyn Fn(&PeerId) -> CapabilityResult<bool> + Send + Sync>;
type Signer = Box<dyn Fn(&[u8], &[u8]) -> CapabilityResult<Signature> + Send + Sync>;

/// Collects one binding per operation. See [`CapabilityContractBuilder::build`].
#[derive(Default)]
pub struct CapabilityContractBuilder {
    network_name: Option<Nullary<String>>,
    tipset_by_epoch: Option<ByEpoch>,
    tipset: Option<ByKey<TipSet>>,
    head: Option<Nullary<TipSet>>,
    parent: Option<ByKey<TipSet>>,
    power_table: Option<ByKey<PowerEntries>>,
    protect_peer: Option<ByPeer>,
    participating_miner_ids: Option<Nullary<Vec<ActorId>>>,
    sign_message: Option<Signer>,
    finalize: Option<ByKey<()>>,
    version: Option<Nullary<VersionInfo>>,
    net_addrs_listen: Option<Nullary<AddrInfo>>,
}

impl CapabilityContractBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network_name<F>(mut self, f: F) -> Self
    where
        F: Fn() -> CapabilityResult<String> + Send + Sync + 'static,
    {
        self.network_name = Some(Box::new(f));
        self
    }

    pub fn tipset_by_epoch<F>(mut self, f: F) -> Self
    where
        F: Fn(ChainEpoch) -> CapabilityResult<TipSet> + Send + Sync + 'static,
    {
        self.tipset_by_epoch = Some(Box::new(f));
        self
    }

    pub fn tipset<F>(mut self, f: F) -> Self
    where
        F: Fn(&TipSetKey) -> CapabilityResult<TipSet> + Send + Sync + 'static,
    {
        self.tipset = Some(Box::new(f));
        self
    }

    pub fn head<F>(mut self, f: F) -> Self
    where
        F: Fn() -> CapabilityResult<TipSet> + Send + Sync + 'static,
    {
        self.head = Some(Box::new(f));
        self
    }

    pub fn parent<F>(mut self, f: F) -> Self
    where
        F: Fn(&TipSetKey) -> CapabilityResult<TipSet> + Send + Sync + 'static,
    {
        self.parent = Some(Box::new(f));
        self
    }

    pub fn power_table<F>(mut self, f: F) -> Self
    where
        F: Fn(&TipSetKey) -> CapabilityResult<PowerEntries> + Send + Sync + 'static,
    {
        self.power_table = Some(Box::new(f));
        self
    }

    pub fn protect_peer<F>(mut self, f: F) -> Self
    where
        F: Fn(&PeerId) -> CapabilityResult<bool> + Send + Sync + 'static,
    {
        self.protect_peer = Some(Box::new(f));
        self
    }

    pub fn participating_miner_ids<F>(mut self, f: F) -> Self
    where
        F: Fn() -> CapabilityResult<Vec<ActorId>> + Send + Sync + 'static,
    {
        self.participating_miner_ids = Some(Box::new(f));
        self
    }

    pub fn sign_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8], &[u8]) -> CapabilityResult<Signature> + Send + Sync + 'static,
    {
        self.sign_message = Some(Box::new(f));
        self
    }

    pub fn finalize<F>(mut self, f: F) -> Self
    where
        F: Fn(&TipSetKey) -> CapabilityResult<()> + Send + Sync + 'static,
    {
        self.finalize = Some(Box::new(f));
        self
    }

    pub fn version<F>(mut self, f: F) -> Self
    where
        F: Fn() -> CapabilityResult<VersionInfo> + Send + Sync + 'static,
    {
        self.version = Some(Box::new(f));
        self
    }

    pub fn net_addrs_listen<F>(mut self, f: F) -> Self
    where
        F: Fn() -> CapabilityResult<AddrInfo> + Send + Sync + 'static,
    {
        self.net_addrs_listen = Some(Box::new(f));
        self
    }

    /// Operations that have no binding yet, in declaration order.
    pub fn missing(&self) -> Vec<CapabilityName> {
        CapabilityName::ALL
            .into_iter()
            .filter(|name| !self.is_bound(*name))
            .collect()
    }

    fn is_bound(&self, name: CapabilityName) -> bool {
        match name {
            CapabilityName::NetworkName => self.network_name.is_some(),
            CapabilityName::TipSetByEpoch => self.tipset_by_epoch.is_some(),
            CapabilityName::TipSet => self.tipset.is_some(),
            CapabilityName::Head => self.head.is_some(),
            CapabilityName::Parent => self.parent.is_some(),
            CapabilityName::PowerTable => self.power_table.is_some(),
            CapabilityName::ProtectPeer => self.protect_peer.is_some(),
            CapabilityName::ParticipatingMinerIds => self.participating_miner_ids.is_some(),
            CapabilityName::SignMessage => self.sign_message.is_some(),
            CapabilityName::Finalize => self.finalize.is_some(),
            CapabilityName::Version => self.version.is_some(),
            CapabilityName::NetAddrsListen => self.net_addrs_listen.is_some(),
        }
    }

    /// Validate the contract. Fails with [`ContractError::Incomplete`]
    /// listing every unbound operation; no partial contract is produced.
    pub fn build(self) -> Result<CapabilityContract, ContractError> {
        let missing = self.missing();
        let Self {
            network_name: Some(network_name),
            tipset_by_epoch: Some(tipset_by_epoch),
            tipset: Some(tipset),
            head: Some(head),
            parent: Some(parent),
            power_table: Some(power_table),
            protect_peer: Some(protect_peer),
            participating_miner_ids: Some(participating_miner_ids),
            sign_message: Some(sign_message),
            finalize: Some(finalize),
            version: Some(version),
            net_addrs_listen: Some(net_addrs_listen),
        } = self
        else {
            return Err(ContractError::Incomplete { missing });
        };
        Ok(CapabilityContract {
            network_name,
            tipset_by_epoch,
            tipset,
            head,
            parent,
            power_table,
            protect_peer,
            participating_miner_ids,
            sign_message,
            finalize,
            version,
            net_addrs_listen,
        })
    }
}

/// A validated contract: every operation is bound.
pub struct CapabilityContract {
    network_name: Nullary<String>,
    tipset_by_epoch: ByEpoch,
    tipset: ByKey<TipSet>,
    head: Nullary<TipSet>,
    parent: ByKey<TipSet>,
    power_table: ByKey<PowerEntries>,
    protect_peer: ByPeer,
    participating_miner_ids: Nullary<Vec<ActorId>>,
    sign_message: Signer,
    finalize: ByKey<()>,
    version: Nullary<VersionInfo>,
    net_addrs_listen: Nullary<AddrInfo>,
}

impl fmt::Debug for CapabilityContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityContract").finish_non_exhaustive()
    }
}

impl HostCapabilities for CapabilityContract {
    fn network_name(&self) -> CapabilityResult<String> {
        (self.network_name)()
    }

    fn tipset_by_epoch(&self, epoch: ChainEpoch) -> CapabilityResult<TipSet> {
        (self.tipset_by_epoch)(epoch)
    }

    fn tipset(&self, key: &TipSetKey) -> CapabilityResult<TipSet> {
        (self.tipset)(key)
    }

    fn head(&self) -> CapabilityResult<TipSet> {
        (self.head)()
    }

    fn parent(&self, key: &TipSetKey) -> CapabilityResult<TipSet> {
        (self.parent)(key)
    }

    fn power_table(&self, key: &TipSetKey) -> CapabilityResult<PowerEntries> {
        (self.power_table)(key)
    }

    fn protect_peer(&self, peer: &PeerId) -> CapabilityResult<bool> {
        (self.protect_peer)(peer)
    }

    fn participating_miner_ids(&self) -> CapabilityResult<Vec<ActorId>> {
        (self.participating_miner_ids)()
    }

    fn sign_message(&self, signer: &[u8], message: &[u8]) -> CapabilityResult<Signature> {
        (self.sign_message)(signer, message)
    }

    fn finalize(&self, key: &TipSetKey) -> CapabilityResult<()> {
        (self.finalize)(key)
    }

    fn version(&self) -> CapabilityResult<VersionInfo> {
        (self.version)()
    }

    fn net_addrs_listen(&self) -> CapabilityResult<AddrInfo> {
        (self.net_addrs_listen)()
    }
}
