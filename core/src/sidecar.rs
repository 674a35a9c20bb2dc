//! Bootstrap: wires a validated contract and configuration to an engine.

use {
    crate::{
        capabilities::{CapabilityContractBuilder, HostCapabilities},
        config::SidecarConfig,
        engine::{EngineFactory, FinalityEngine},
        error::{Result, SidecarError},
        query::QueryFacade,
        supervisor::{Supervisor, SupervisorHandle, LOG_TARGET},
    },
    log::*,
    std::{
        fmt,
        sync::{atomic::AtomicBool, Arc},
    },
};

/// A constructed sidecar: one engine, shared by the supervisor (which drives
/// it) and any number of query facades (which only read it).
pub struct Sidecar<E> {
    engine: Arc<E>,
    config: SidecarConfig,
    exit: Arc<AtomicBool>,
}

impl<E> fmt::Debug for Sidecar<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sidecar")
            .field("config", &self.config)
            .field("exit", &self.exit)
            .finish_non_exhaustive()
    }
}

impl<E: FinalityEngine + 'static> Sidecar<E> {
    /// Validate the configuration and the host's bindings, then construct
    /// the engine.
    ///
    /// Configuration defects are reported before the factory is invoked;
    /// the factory is invoked at most once.
    pub fn bootstrap<F>(
        config: SidecarConfig,
        bindings: CapabilityContractBuilder,
        factory: &F,
    ) -> Result<Self>
    where
        F: EngineFactory<Engine = E>,
    {
        config.validate()?;
        let contract = bindings.build().inspect_err(|err| error!(target: LOG_TARGET, "{err}"))?;
        Self::construct(config, Arc::new(contract), factory)
    }

    /// Like [`Sidecar::bootstrap`], for hosts that implement
    /// [`HostCapabilities`] directly.
    pub fn bootstrap_with_capabilities<F>(
        config: SidecarConfig,
        capabilities: Arc<dyn HostCapabilities>,
        factory: &F,
    ) -> Result<Self>
    where
        F: EngineFactory<Engine = E>,
    {
        config.validate()?;
        Self::construct(config, capabilities, factory)
    }

    fn construct<F>(
        config: SidecarConfig,
        capabilities: Arc<dyn HostCapabilities>,
        factory: &F,
    ) -> Result<Self>
    where
        F: EngineFactory<Engine = E>,
    {
        let engine = factory
            .create(capabilities)
            .map_err(SidecarError::EngineConstruction)?;
        info!(
            target: LOG_TARGET,
            "finality engine constructed (rpc {}, sidecar rpc {}, db {})",
            config.rpc_endpoint,
            config.f3_rpc_endpoint,
            config.db_path.display()
        );
        Ok(Self {
            engine: Arc::new(engine),
            config,
            exit: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &SidecarConfig {
        &self.config
    }

    /// Flag that stops the supervised loop at its next opportunity.
    pub fn exit_flag(&self) -> Arc<AtomicBool> {
        self.exit.clone()
    }

    pub fn query(&self) -> QueryFacade<E> {
        QueryFacade::new(self.engine.clone())
    }

    pub fn supervisor(&self) -> Supervisor<E> {
        Supervisor::new(
            self.engine.clone(),
            self.config.run_params(),
            self.config.supervisor.clone(),
            self.exit.clone(),
        )
    }

    /// Start the supervised run loop on its own thread.
    pub fn spawn_supervisor(&self) -> Result<SupervisorHandle> {
        Ok(self.supervisor().spawn()?)
    }
}
