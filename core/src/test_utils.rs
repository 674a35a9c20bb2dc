//! Fakes and fixtures for exercising the sidecar without a real engine or
//! host node.

use {
    crate::{
        capabilities::{CapabilityContractBuilder, CapabilityName, HostCapabilities},
        config::{RunParams, SidecarConfig, SupervisorConfig},
        engine::{EngineFactory, EngineResult, FinalityEngine},
        supervisor::Backoff,
    },
    anyhow::anyhow,
    log::{Level, Log, Metadata, Record},
    f3_sidecar_types::{
        AddrInfo, ECChain, ECTipSet, EcConfig, FinalityCertificate, InstanceProgress, Manifest,
        PeerId, Phase, PowerEntries, PowerEntry, Signature, SignatureType, SupplementalData,
        TipSet, TipSetKey, VersionInfo,
    },
    parking_lot::{Mutex, RwLock},
    std::{
        collections::{BTreeMap, HashMap},
        path::PathBuf,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc, Once,
        },
        thread::{self, ThreadId},
        time::Duration,
    },
};

pub fn sample_tipset(epoch: i64) -> TipSet {
    TipSet {
        key: TipSetKey::new(epoch.to_be_bytes().to_vec()),
        epoch,
        beacon: vec![0xbe; 4],
        timestamp: 1_700_000_000,
    }
}

pub fn sample_power_table() -> PowerEntries {
    PowerEntries::new(vec![
        PowerEntry {
            id: 1000,
            power: 3 << 40,
            pub_key: vec![0xa0; 48],
        },
        PowerEntry {
            id: 1001,
            power: 1 << 40,
            pub_key: vec![0xa1; 48],
        },
    ])
}

/// A manifest whose initial power table is still undefined.
pub fn sample_manifest() -> Manifest {
    Manifest {
        pause: false,
        protocol_version: 7,
        initial_instance: 0,
        bootstrap_epoch: 2_081_674,
        network_name: "calibrationnet".to_string(),
        explicit_power: vec![],
        ignore_ec_power: false,
        initial_power_table: None,
        committee_lookback: 10,
        ec: EcConfig {
            period_secs: 30,
            finality: 900,
            delay_multiplier: 2.0,
            base_decision_backoff_table: vec![1.3, 1.69, 2.2, 2.86, 3.71, 4.83, 6.27, 7.5],
            head_lookback: 4,
            finalize: true,
        },
    }
}

/// A certificate for `instance` whose chain base carries `base_power_table`.
pub fn certificate(instance: u64, base_power_table: &str) -> FinalityCertificate {
    let epoch = 2_081_674i64.saturating_add(instance as i64);
    FinalityCertificate {
        gpbft_instance: instance,
        ec_chain: ECChain::new(vec![
            ECTipSet {
                key: TipSetKey::new(epoch.to_be_bytes().to_vec()),
                epoch,
                power_table: base_power_table.parse().expect("valid cid"),
                commitments: vec![0; 32],
            },
            ECTipSet {
                key: TipSetKey::new(epoch.saturating_add(1).to_be_bytes().to_vec()),
                epoch: epoch.saturating_add(1),
                power_table: "bafyhead".parse().expect("valid cid"),
                commitments: vec![0; 32],
            },
        ]),
        supplemental_data: SupplementalData {
            commitments: vec![0; 32],
            power_table: "bafynext".parse().expect("valid cid"),
        },
        signers: vec![0x01],
        signature: vec![0x5a; 96],
    }
}

pub fn sample_config() -> SidecarConfig {
    SidecarConfig {
        rpc_endpoint: "http://127.0.0.1:2345/rpc/v1".to_string(),
        jwt: "token".to_string(),
        f3_rpc_endpoint: "127.0.0.1:23456".to_string(),
        initial_power_table: None,
        bootstrap_epoch: 2_081_674,
        finality: 900,
        db_path: PathBuf::from("/tmp/f3-sidecar-db"),
        supervisor: SupervisorConfig::default(),
        log_levels: BTreeMap::new(),
    }
}

pub fn run_params() -> RunParams {
    sample_config().run_params()
}

/// A host with every operation bound to canned data, except `skip`.
pub fn host_contract_builder(skip: Option<CapabilityName>) -> CapabilityContractBuilder {
    let bound = |name: CapabilityName| skip != Some(name);
    let mut builder = CapabilityContractBuilder::new();
    if bound(CapabilityName::NetworkName) {
        builder = builder.network_name(|| Ok("calibrationnet".to_string()));
    }
    if bound(CapabilityName::TipSetByEpoch) {
        builder = builder.tipset_by_epoch(|epoch| Ok(sample_tipset(epoch)));
    }
    if bound(CapabilityName::TipSet) {
        builder = builder.tipset(|_key| Ok(sample_tipset(100)));
    }
    if bound(CapabilityName::Head) {
        builder = builder.head(|| Ok(sample_tipset(100)));
    }
    if bound(CapabilityName::Parent) {
        builder = builder.parent(|_key| Ok(sample_tipset(99)));
    }
    if bound(CapabilityName::PowerTable) {
        builder = builder.power_table(|_key| Ok(sample_power_table()));
    }
    if bound(CapabilityName::ProtectPeer) {
        builder = builder.protect_peer(|_peer| Ok(true));
    }
    if bound(CapabilityName::ParticipatingMinerIds) {
        builder = builder.participating_miner_ids(|| Ok(vec![1000, 1001]));
    }
    if bound(CapabilityName::SignMessage) {
        builder = builder.sign_message(|_signer, _message| {
            Ok(Signature {
                sig_type: SignatureType::Bls,
                data: vec![0x5a; 96],
            })
        });
    }
    if bound(CapabilityName::Finalize) {
        builder = builder.finalize(|_key| Ok(()));
    }
    if bound(CapabilityName::Version) {
        builder = builder.version(|| {
            Ok(VersionInfo {
                api_version: 0x0002_0300,
                block_delay: 30,
                version: "0.1.0".to_string(),
            })
        });
    }
    if bound(CapabilityName::NetAddrsListen) {
        builder = builder.net_addrs_listen(|| {
            Ok(AddrInfo {
                id: PeerId::new("12D3KooWSidecarTestPeer"),
                addrs: vec!["/ip4/127.0.0.1/tcp/1234".to_string()],
            })
        });
    }
    builder
}

#[derive(Debug)]
struct FakeState {
    progress: InstanceProgress,
    manifest: Manifest,
    certificates: BTreeMap<u64, FinalityCertificate>,
    power_tables: HashMap<TipSetKey, PowerEntries>,
    instance_power_tables: BTreeMap<u64, PowerEntries>,
}

/// Scripted engine. Every run advances progress by one instance, blocks
/// for `run_duration`, then fails while failures remain.
#[derive(Debug)]
pub struct FakeEngine {
    state: RwLock<FakeState>,
    running: AtomicBool,
    failures_remaining: AtomicUsize,
    run_duration: Duration,
    run_calls: AtomicUsize,
    genesis_fetches: AtomicUsize,
    last_params: Mutex<Option<RunParams>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(FakeState {
                progress: InstanceProgress::default(),
                manifest: sample_manifest(),
                certificates: BTreeMap::new(),
                power_tables: HashMap::new(),
                instance_power_tables: BTreeMap::new(),
            }),
            running: AtomicBool::new(false),
            failures_remaining: AtomicUsize::new(0),
            run_duration: Duration::ZERO,
            run_calls: AtomicUsize::new(0),
            genesis_fetches: AtomicUsize::new(0),
            last_params: Mutex::new(None),
        }
    }

    /// Fail the next `n` runs.
    pub fn failing_runs(self, n: usize) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_run_duration(mut self, duration: Duration) -> Self {
        self.run_duration = duration;
        self
    }

    pub fn with_manifest(self, manifest: Manifest) -> Self {
        self.state.write().manifest = manifest;
        self
    }

    pub fn with_certificate(self, certificate: FinalityCertificate) -> Self {
        self.state
            .write()
            .certificates
            .insert(certificate.gpbft_instance, certificate);
        self
    }

    pub fn with_power_table(self, key: TipSetKey, table: PowerEntries) -> Self {
        self.state.write().power_tables.insert(key, table);
        self
    }

    pub fn with_instance_power_table(self, instance: u64, table: PowerEntries) -> Self {
        self.state
            .write()
            .instance_power_tables
            .insert(instance, table);
        self
    }

    pub fn run_calls(&self) -> usize {
        self.run_calls.load(Ordering::SeqCst)
    }

    /// How many times certificate 0 was requested.
    pub fn genesis_fetches(&self) -> usize {
        self.genesis_fetches.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> Option<RunParams> {
        self.last_params.lock().clone()
    }
}

impl FinalityEngine for FakeEngine {
    fn run(&self, params: &RunParams) -> EngineResult<()> {
        let call = self.run_calls.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        *self.last_params.lock() = Some(params.clone());
        self.running.store(true, Ordering::SeqCst);
        {
            let mut state = self.state.write();
            let next = state.progress.id.saturating_add(1);
            state.progress = InstanceProgress {
                id: next,
                round: next,
                phase: Phase::Decide,
            };
        }
        if !self.run_duration.is_zero() {
            thread::sleep(self.run_duration);
        }
        self.running.store(false, Ordering::SeqCst);

        let fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            Err(anyhow!("engine run {call} failed"))
        } else {
            Ok(())
        }
    }

    fn certificate(&self, instance: u64) -> EngineResult<FinalityCertificate> {
        if instance == 0 {
            self.genesis_fetches.fetch_add(1, Ordering::SeqCst);
        }
        self.state
            .read()
            .certificates
            .get(&instance)
            .cloned()
            .ok_or_else(|| anyhow!("certificate for instance {instance} not found"))
    }

    fn latest_certificate(&self) -> EngineResult<FinalityCertificate> {
        self.state
            .read()
            .certificates
            .values()
            .next_back()
            .cloned()
            .ok_or_else(|| anyhow!("no certificates yet"))
    }

    fn power_table(&self, key: &TipSetKey) -> EngineResult<PowerEntries> {
        self.state
            .read()
            .power_tables
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("no power table for tipset {key}"))
    }

    fn power_table_by_instance(&self, instance: u64) -> EngineResult<PowerEntries> {
        self.state
            .read()
            .instance_power_tables
            .get(&instance)
            .cloned()
            .ok_or_else(|| anyhow!("no power table for instance {instance}"))
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn progress(&self) -> InstanceProgress {
        self.state.read().progress
    }

    fn manifest(&self) -> Manifest {
        self.state.read().manifest.clone()
    }
}

/// Hands out a single prepared [`FakeEngine`] and records how it was asked.
pub struct FakeFactory {
    engine: Mutex<Option<FakeEngine>>,
    failure: Option<String>,
    created: AtomicUsize,
    network_name_seen: Mutex<Option<String>>,
}

impl FakeFactory {
    pub fn new(engine: FakeEngine) -> Self {
        Self {
            engine: Mutex::new(Some(engine)),
            failure: None,
            created: AtomicUsize::new(0),
            network_name_seen: Mutex::new(None),
        }
    }

    /// A factory whose construction always fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            engine: Mutex::new(None),
            failure: Some(message.to_string()),
            created: AtomicUsize::new(0),
            network_name_seen: Mutex::new(None),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Network name the factory read through the capabilities it was given.
    pub fn network_name_seen(&self) -> Option<String> {
        self.network_name_seen.lock().clone()
    }
}

impl EngineFactory for FakeFactory {
    type Engine = FakeEngine;

    fn create(&self, capabilities: Arc<dyn HostCapabilities>) -> EngineResult<FakeEngine> {
        self.created.fetch_add(1, Ordering::SeqCst);
        *self.network_name_seen.lock() = capabilities.network_name().ok();
        if let Some(message) = &self.failure {
            return Err(anyhow!("{message}"));
        }
        self.engine
            .lock()
            .take()
            .ok_or_else(|| anyhow!("fake factory already handed out its engine"))
    }
}

/// Records backoff waits instead of sleeping.
#[derive(Debug, Default)]
pub struct CountingBackoff {
    intervals: Mutex<Vec<Duration>>,
}

impl CountingBackoff {
    pub fn waits(&self) -> usize {
        self.intervals.lock().len()
    }

    pub fn intervals(&self) -> Vec<Duration> {
        self.intervals.lock().clone()
    }
}

impl Backoff for CountingBackoff {
    fn wait(&self, interval: Duration, _exit: &AtomicBool) -> bool {
        self.intervals.lock().push(interval);
        true
    }
}

/// A log record seen by [`take_logs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLog {
    pub level: Level,
    pub target: String,
    pub message: String,
}

static CAPTURED_LOGS: Mutex<Vec<(ThreadId, CapturedLog)>> = parking_lot::const_mutex(Vec::new());

struct CapturingLogger;

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let captured = CapturedLog {
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        };
        CAPTURED_LOGS.lock().push((thread::current().id(), captured));
    }

    fn flush(&self) {}
}

static CAPTURING_LOGGER: CapturingLogger = CapturingLogger;

/// Install the capturing logger for this process. Idempotent.
pub fn capture_logs() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // Only this module installs a logger in test builds.
        if log::set_logger(&CAPTURING_LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
}

/// Drain the records logged so far by the calling thread.
pub fn take_logs() -> Vec<CapturedLog> {
    let current = thread::current().id();
    let mut captured = CAPTURED_LOGS.lock();
    let (mine, others) = captured
        .drain(..)
        .partition::<Vec<_>, _>(|(thread, _)| *thread == current);
    *captured = others;
    mine.into_iter().map(|(_, record)| record).collect()
}
