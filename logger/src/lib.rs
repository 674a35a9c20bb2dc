//! Process-wide logging and runtime environment setup.
//!
//! The sidecar embeds a finality engine whose networking stack is very
//! chatty. [`initialize`] installs an `env_logger` backend with a
//! per-component verbosity table and applies the engine runtime's
//! pointer-check relaxation. It is called once by the process entry point,
//! before the engine is constructed.

use {
    env_logger::Builder,
    log::LevelFilter,
    std::sync::atomic::{AtomicBool, Ordering},
};

/// Environment variable read by the engine runtime at start-up.
pub const RUNTIME_DEBUG_ENV: &str = "GODEBUG";

/// Value of [`RUNTIME_DEBUG_ENV`] that disables the runtime's pointer checks
/// for values crossing the language boundary.
pub const RELAXED_POINTER_CHECKS: &str = "invalidptr=0,cgocheck=0";

/// Component whose own logs are emitted at debug level by default.
pub const SIDECAR_COMPONENT: &str = "f3/sidecar";

static INITIALIZED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("logger already initialized")]
    AlreadyInitialized,
    #[error("unknown log level {level:?} for component {component:?}")]
    UnknownLevel { component: String, level: String },
}

/// Verbosity override for a single component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentLevel {
    /// Component name as used by the engine, e.g. `dht/RtRefreshManager`.
    pub component: String,
    pub level: LevelFilter,
}

impl ComponentLevel {
    pub fn new(component: impl Into<String>, level: LevelFilter) -> Self {
        Self {
            component: component.into(),
            level,
        }
    }

    /// Log target the component's records are emitted under.
    pub fn target(&self) -> String {
        component_target(&self.component)
    }
}

/// Logging configuration applied by [`initialize`].
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Level for everything not listed in `components`.
    pub default_level: LevelFilter,
    /// Per-component overrides, applied in order; later entries win.
    pub components: Vec<ComponentLevel>,
    /// Set the engine runtime's pointer-check relaxation toggle.
    pub relax_pointer_checks: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            default_level: LevelFilter::Info,
            components: vec![
                ComponentLevel::new("dht", LevelFilter::Error),
                // RtRefreshManager writes raw control sequences that break terminals.
                ComponentLevel::new("dht/RtRefreshManager", LevelFilter::Off),
                ComponentLevel::new("net/identify", LevelFilter::Error),
                ComponentLevel::new("pubsub", LevelFilter::Error),
                ComponentLevel::new("swarm2", LevelFilter::Error),
                ComponentLevel::new(SIDECAR_COMPONENT, LevelFilter::Debug),
            ],
            relax_pointer_checks: true,
        }
    }
}

impl LoggerConfig {
    /// Override (or add) the level of one component from its textual form.
    ///
    /// Accepts the `log` level names plus `fatal`, which mutes the component.
    pub fn with_component(mut self, component: &str, level: &str) -> Result<Self, LoggerError> {
        let level = parse_level(level).ok_or_else(|| LoggerError::UnknownLevel {
            component: component.to_string(),
            level: level.to_string(),
        })?;
        match self
            .components
            .iter_mut()
            .find(|existing| existing.component == component)
        {
            Some(existing) => existing.level = level,
            None => self.components.push(ComponentLevel::new(component, level)),
        }
        Ok(self)
    }

    /// The effective level of a component.
    pub fn level_of(&self, component: &str) -> LevelFilter {
        self.components
            .iter()
            .rev()
            .find(|entry| entry.component == component)
            .map(|entry| entry.level)
            .unwrap_or(self.default_level)
    }

    fn builder(&self) -> Builder {
        let mut builder = Builder::new();
        builder.filter_level(self.default_level);
        for entry in &self.components {
            builder.filter_module(&entry.target(), entry.level);
        }
        // RUST_LOG wins over the table.
        builder.parse_default_env();
        builder.format_timestamp_millis();
        builder
    }
}

/// Install the process-wide logger and apply runtime toggles.
///
/// Must be called once, from the process entry point, before any engine
/// thread is started. Subsequent calls fail with
/// [`LoggerError::AlreadyInitialized`] and change nothing.
pub fn initialize(config: &LoggerConfig) -> Result<(), LoggerError> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Err(LoggerError::AlreadyInitialized);
    }
    if config.relax_pointer_checks {
        // SAFETY: runs once, at start-up, before the engine or any other
        // thread that could read the environment exists.
        unsafe { std::env::set_var(RUNTIME_DEBUG_ENV, RELAXED_POINTER_CHECKS) };
    }
    config
        .builder()
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)?;
    log::debug!(
        "logger initialized (default level {}, {} component overrides)",
        config.default_level,
        config.components.len()
    );
    Ok(())
}

/// Map an engine component name to a log target (`a/b` becomes `a::b`).
pub fn component_target(component: &str) -> String {
    component.replace('/', "::")
}

fn parse_level(level: &str) -> Option<LevelFilter> {
    if level.eq_ignore_ascii_case("fatal") {
        return Some(LevelFilter::Off);
    }
    level.parse().ok()
}
