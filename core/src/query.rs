//! Read-only query facade over a running engine.

use {
    crate::{
        engine::{EngineResult, FinalityEngine},
        supervisor::LOG_TARGET,
    },
    f3_sidecar_types::{FinalityCertificate, InstanceProgress, Manifest, PowerEntries, TipSetKey},
    log::*,
    std::sync::Arc,
};

/// Instance number of the genesis certificate.
const GENESIS_INSTANCE: u64 = 0;

/// Host-facing accessors for certificates, power tables, progress and the
/// manifest.
///
/// Holds only a shared reference to the engine and never mutates it, so any
/// number of clones may be used concurrently with the supervised run loop.
/// Lookup errors are the engine's and are returned unchanged.
pub struct QueryFacade<E: ?Sized> {
    engine: Arc<E>,
}

impl<E: ?Sized> Clone for QueryFacade<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<E: FinalityEngine + ?Sized> QueryFacade<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    pub fn certificate(&self, instance: u64) -> EngineResult<FinalityCertificate> {
        self.engine.certificate(instance)
    }

    pub fn latest_certificate(&self) -> EngineResult<FinalityCertificate> {
        self.engine.latest_certificate()
    }

    pub fn power_table(&self, key: &TipSetKey) -> EngineResult<PowerEntries> {
        self.engine.power_table(key)
    }

    pub fn power_table_by_instance(&self, instance: u64) -> EngineResult<PowerEntries> {
        self.engine.power_table_by_instance(instance)
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn progress(&self) -> InstanceProgress {
        self.engine.progress()
    }

    /// The current manifest. When its initial power table is still
    /// undefined, it is filled in from the base of the genesis certificate's
    /// chain if that certificate can be fetched.
    pub fn manifest(&self) -> Manifest {
        backfill_initial_power_table(self.engine.manifest(), || {
            self.engine.certificate(GENESIS_INSTANCE)
        })
    }
}

/// Best-effort enrichment: never fails, never touches a defined field.
fn backfill_initial_power_table(
    mut manifest: Manifest,
    fetch_genesis: impl FnOnce() -> EngineResult<FinalityCertificate>,
) -> Manifest {
    if manifest.has_initial_power_table() {
        return manifest;
    }
    match fetch_genesis() {
        Ok(genesis) => match genesis.base_power_table() {
            Some(power_table) => manifest.initial_power_table = Some(power_table.clone()),
            None => warn!(
                target: LOG_TARGET,
                "genesis certificate has an empty chain, initial power table left undefined"
            ),
        },
        Err(err) => {
            debug!(
                target: LOG_TARGET,
                "genesis certificate unavailable, initial power table left undefined: {err:#}"
            )
        }
    }
    manifest
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            supervisor::Supervisor,
            test_utils::{
                capture_logs, certificate, run_params, sample_manifest, take_logs, FakeEngine,
            },
            SupervisorConfig,
        },
        f3_sidecar_logger::{component_target, LoggerConfig, SIDECAR_COMPONENT},
        f3_sidecar_types::Cid,
        log::{Level, LevelFilter},
        std::{
            sync::atomic::AtomicBool,
            thread,
            time::Duration,
        },
    };

    fn cid(text: &str) -> Cid {
        text.parse().unwrap()
    }

    #[test]
    fn test_defined_power_table_is_left_alone() {
        let mut manifest = sample_manifest();
        manifest.initial_power_table = Some(cid("bafymanifest"));
        let engine = Arc::new(
            FakeEngine::new()
                .with_manifest(manifest.clone())
                .with_certificate(certificate(0, "bafygenesis")),
        );
        let facade = QueryFacade::new(engine.clone());

        assert_eq!(facade.manifest(), manifest);
        assert_eq!(engine.genesis_fetches(), 0);
    }

    #[test]
    fn test_undefined_power_table_is_backfilled_from_genesis() {
        let engine = Arc::new(
            FakeEngine::new()
                .with_manifest(sample_manifest())
                .with_certificate(certificate(0, "bafygenesis"))
                .with_certificate(certificate(1, "bafyone")),
        );
        let facade = QueryFacade::new(engine.clone());

        let manifest = facade.manifest();
        assert_eq!(manifest.initial_power_table, Some(cid("bafygenesis")));
        assert_eq!(
            Manifest {
                initial_power_table: None,
                ..manifest
            },
            sample_manifest()
        );
        assert_eq!(engine.genesis_fetches(), 1);
    }

    #[test]
    fn test_backfill_failure_is_swallowed() {
        let engine = Arc::new(FakeEngine::new().with_manifest(sample_manifest()));
        let facade = QueryFacade::new(engine.clone());

        assert_eq!(facade.manifest(), sample_manifest());
        assert_eq!(engine.genesis_fetches(), 1);
    }

    #[test]
    fn test_backfill_failure_is_logged_under_sidecar_target() {
        capture_logs();
        take_logs();
        let facade = QueryFacade::new(Arc::new(FakeEngine::new().with_manifest(sample_manifest())));
        facade.manifest();

        let logs = take_logs();
        let record = logs
            .iter()
            .find(|record| record.message.starts_with("genesis certificate unavailable"))
            .unwrap();
        assert_eq!(record.level, Level::Debug);
        assert_eq!(record.target, LOG_TARGET);
        assert!(record.message.ends_with("certificate for instance 0 not found"));

        // The default table lets this target through at debug.
        assert_eq!(component_target(SIDECAR_COMPONENT), LOG_TARGET);
        assert_eq!(
            LoggerConfig::default().level_of(SIDECAR_COMPONENT),
            LevelFilter::Debug
        );
    }

    #[test]
    fn test_backfill_with_empty_genesis_chain() {
        let mut genesis = certificate(0, "bafygenesis");
        genesis.ec_chain = f3_sidecar_types::ECChain::default();
        let manifest = backfill_initial_power_table(sample_manifest(), || Ok(genesis));
        assert!(manifest.initial_power_table.is_none());
    }

    #[test]
    fn test_lookup_errors_propagate_unchanged() {
        let engine = Arc::new(FakeEngine::new());
        let facade = QueryFacade::new(engine);

        assert_eq!(
            facade.certificate(42).unwrap_err().to_string(),
            "certificate for instance 42 not found"
        );
        assert_eq!(
            facade.latest_certificate().unwrap_err().to_string(),
            "no certificates yet"
        );
        assert_eq!(
            facade.power_table_by_instance(3).unwrap_err().to_string(),
            "no power table for instance 3"
        );
        assert!(facade
            .power_table(&TipSetKey::new(vec![1u8]))
            .unwrap_err()
            .to_string()
            .starts_with("no power table for tipset"));
    }

    #[test]
    fn test_reads_delegate_to_engine() {
        let table = crate::test_utils::sample_power_table();
        let key = TipSetKey::new(vec![7u8]);
        let engine = Arc::new(
            FakeEngine::new()
                .with_certificate(certificate(0, "bafygenesis"))
                .with_certificate(certificate(4, "bafyfour"))
                .with_power_table(key.clone(), table.clone())
                .with_instance_power_table(4, table.clone()),
        );
        let facade = QueryFacade::new(engine);

        assert_eq!(facade.certificate(4).unwrap().gpbft_instance, 4);
        assert_eq!(facade.latest_certificate().unwrap().gpbft_instance, 4);
        assert_eq!(facade.power_table(&key).unwrap(), table);
        assert_eq!(facade.power_table_by_instance(4).unwrap(), table);
        assert!(!facade.is_running());
        assert_eq!(facade.progress(), InstanceProgress::default());
    }

    #[test]
    fn test_concurrent_queries_during_retries() {
        let engine = Arc::new(
            FakeEngine::new()
                .failing_runs(usize::MAX)
                .with_run_duration(Duration::from_millis(20))
                .with_manifest(sample_manifest())
                .with_certificate(certificate(0, "bafygenesis")),
        );
        let config = SupervisorConfig {
            max_retries: 2,
            retry_interval_secs: 1,
        };
        let exit = Arc::new(AtomicBool::new(false));
        let handle = Supervisor::new(engine.clone(), run_params(), config, exit)
            .spawn()
            .unwrap();
        let facade = QueryFacade::new(engine);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let facade = facade.clone();
                thread::spawn(move || {
                    let mut last_instance = 0;
                    for _ in 0..200 {
                        let progress = facade.progress();
                        // Progress is a consistent snapshot and never goes backwards.
                        assert!(progress.id >= last_instance);
                        assert_eq!(progress.round, progress.id);
                        last_instance = progress.id;
                        let _ = facade.is_running();
                        assert_eq!(facade.certificate(0).unwrap().gpbft_instance, 0);
                        assert!(facade.manifest().has_initial_power_table());
                        thread::sleep(Duration::from_millis(1));
                    }
                })
            })
            .collect();

        for reader in readers {
            reader.join().unwrap();
        }
        handle.request_exit();
        let report = handle.join().unwrap();
        assert!(!report.succeeded());
        assert!(matches!(
            facade.progress(),
            InstanceProgress { id, round, .. } if id == round
        ));
    }
}
