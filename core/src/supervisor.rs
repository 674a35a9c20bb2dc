//! Supervised run loop.
//!
//! The engine's run entry point blocks for as long as the engine
//! participates in consensus. The [`Supervisor`] keeps it alive across
//! transient failures:
//!
//! ```text
//!  Idle ──▶ Running ──ok──▶ Succeeded ─────────────┐
//!             ▲  │                                  ▼
//!             │  └─err──▶ Retrying ──budget left──┐ Terminated
//!             │                │                  │     ▲
//!             └── backoff ◀────┘   budget spent ──┴─▶ Failed
//! ```
//!
//! A clean exit ends supervision with success. Each failure consumes one
//! retry and waits a flat backoff; once more than `max_retries` failures
//! have been seen the loop gives up and reports failure.

use {
    crate::{
        config::{RunParams, SupervisorConfig},
        engine::FinalityEngine,
    },
    log::*,
    parking_lot::RwLock,
    std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread::{self, Builder, JoinHandle},
        time::{Duration, Instant},
    },
};

/// Log target of the sidecar's own component.
pub(crate) const LOG_TARGET: &str = "f3::sidecar";

/// Granularity at which a backoff wait notices an exit request.
const EXIT_POLL_INTERVAL_MS: u64 = 50;

/// How supervision ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The engine's run entry point returned without error.
    Succeeded,
    /// Every attempt failed and the retry budget is spent.
    Exhausted,
    /// An exit was requested before the engine exited cleanly.
    Cancelled,
}

/// Observable state of the supervised loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    /// Inside the engine's run entry point, on the given attempt (1-based).
    Running { attempt: u32 },
    /// Waiting out the backoff before the given retry (1-based).
    Retrying { retry: u32 },
    Succeeded,
    Failed,
    Terminated(RunOutcome),
}

/// Result of a supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorReport {
    pub outcome: RunOutcome,
    /// Number of times the engine's run entry point was invoked.
    pub attempts: u32,
    /// Number of runs that returned an error.
    pub failures: u32,
}

impl SupervisorReport {
    /// The overall success signal returned to the host.
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }

    /// Number of times the engine was started again after a failure.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Waits between attempts.
pub trait Backoff {
    /// Wait for `interval`. Returns `false` if `exit` was raised meanwhile.
    fn wait(&self, interval: Duration, exit: &AtomicBool) -> bool;
}

/// Sleeps the calling thread, waking periodically to check for exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepBackoff;

impl Backoff for SleepBackoff {
    fn wait(&self, interval: Duration, exit: &AtomicBool) -> bool {
        let started = Instant::now();
        loop {
            if exit.load(Ordering::Relaxed) {
                return false;
            }
            let remaining = interval.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return true;
            }
            thread::sleep(remaining.min(Duration::from_millis(EXIT_POLL_INTERVAL_MS)));
        }
    }
}

/// Shared, read-only view of a supervisor's state.
#[derive(Debug, Clone)]
pub struct SupervisorStatus(Arc<RwLock<SupervisorState>>);

impl SupervisorStatus {
    fn new() -> Self {
        Self(Arc::new(RwLock::new(SupervisorState::Idle)))
    }

    pub fn get(&self) -> SupervisorState {
        *self.0.read()
    }

    fn set(&self, state: SupervisorState) {
        *self.0.write() = state;
    }
}

/// Drives an engine's blocking run entry point with bounded retry.
pub struct Supervisor<E: ?Sized> {
    engine: Arc<E>,
    params: RunParams,
    config: SupervisorConfig,
    status: SupervisorStatus,
    exit: Arc<AtomicBool>,
}

impl<E: FinalityEngine + ?Sized> Supervisor<E> {
    pub fn new(
        engine: Arc<E>,
        params: RunParams,
        config: SupervisorConfig,
        exit: Arc<AtomicBool>,
    ) -> Self {
        Self {
            engine,
            params,
            config,
            status: SupervisorStatus::new(),
            exit,
        }
    }

    pub fn status(&self) -> SupervisorStatus {
        self.status.clone()
    }

    /// Run the engine until it exits cleanly, the retry budget is spent or
    /// an exit is requested. Blocks the calling thread.
    pub fn run(&self, backoff: &impl Backoff) -> SupervisorReport {
        let max_retries = self.config.max_retries;
        let interval = self.config.retry_interval();
        let mut attempts = 0u32;
        let mut failures = 0u32;

        info!(
            target: LOG_TARGET,
            "starting finality engine (max {max_retries} retries, {}s backoff)",
            interval.as_secs()
        );

        let outcome = loop {
            if self.exit.load(Ordering::Relaxed) {
                info!(target: LOG_TARGET, "exit requested, not starting the engine again");
                break RunOutcome::Cancelled;
            }

            attempts = attempts.saturating_add(1);
            self.status.set(SupervisorState::Running { attempt: attempts });
            debug!(target: LOG_TARGET, "engine run attempt {attempts}: {:?}", self.params);

            match self.engine.run(&self.params) {
                Ok(()) => {
                    info!(target: LOG_TARGET, "finality engine exited cleanly after {attempts} attempt(s)");
                    self.status.set(SupervisorState::Succeeded);
                    break RunOutcome::Succeeded;
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    if failures > max_retries {
                        error!(
                            target: LOG_TARGET,
                            "F3 failure on attempt {attempts}, retry budget of {max_retries} spent, giving up. error={err:#}"
                        );
                        self.status.set(SupervisorState::Failed);
                        break RunOutcome::Exhausted;
                    }
                    error!(
                        target: LOG_TARGET,
                        "Unexpected F3 failure, retrying({failures}) in {}s... error={err:#}",
                        interval.as_secs()
                    );
                    self.status.set(SupervisorState::Retrying { retry: failures });
                    if !backoff.wait(interval, &self.exit) {
                        info!(target: LOG_TARGET, "exit requested during backoff");
                        break RunOutcome::Cancelled;
                    }
                }
            }
        };

        self.status.set(SupervisorState::Terminated(outcome));
        SupervisorReport {
            outcome,
            attempts,
            failures,
        }
    }
}

impl<E: FinalityEngine + ?Sized + 'static> Supervisor<E> {
    /// Move the run loop onto a dedicated thread.
    pub fn spawn(self) -> std::io::Result<SupervisorHandle> {
        let status = self.status();
        let exit = self.exit.clone();
        let thread = Builder::new()
            .name("f3SidecarRun".to_string())
            .spawn(move || self.run(&SleepBackoff))?;
        Ok(SupervisorHandle {
            thread,
            status,
            exit,
        })
    }
}

/// Handle to a supervisor running on its own thread.
pub struct SupervisorHandle {
    thread: JoinHandle<SupervisorReport>,
    status: SupervisorStatus,
    exit: Arc<AtomicBool>,
}

impl SupervisorHandle {
    pub fn state(&self) -> SupervisorState {
        self.status.get()
    }

    /// Ask the loop to stop at the next attempt boundary or during backoff.
    /// An attempt already inside the engine runs to completion.
    pub fn request_exit(&self) {
        self.exit.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> thread::Result<SupervisorReport> {
        self.thread.join()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_utils::{capture_logs, run_params, take_logs, CountingBackoff, FakeEngine},
        log::Level,
        std::sync::atomic::AtomicUsize,
    };

    fn supervisor(engine: FakeEngine) -> Supervisor<FakeEngine> {
        Supervisor::new(
            Arc::new(engine),
            run_params(),
            SupervisorConfig::default(),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn test_clean_exit_on_first_attempt() {
        let supervisor = supervisor(FakeEngine::new());
        let backoff = CountingBackoff::default();
        let report = supervisor.run(&backoff);
        assert!(report.succeeded());
        assert_eq!(report.attempts, 1);
        assert_eq!(report.retries(), 0);
        assert_eq!(report.failures, 0);
        assert_eq!(backoff.waits(), 0);
        assert_eq!(
            supervisor.status().get(),
            SupervisorState::Terminated(RunOutcome::Succeeded)
        );
    }

    #[test]
    fn test_recovers_after_k_failures() {
        for k in 1..=5u32 {
            let engine = FakeEngine::new().failing_runs(k as usize);
            let supervisor = supervisor(engine);
            let backoff = CountingBackoff::default();
            let report = supervisor.run(&backoff);
            assert!(report.succeeded(), "k = {k}");
            assert_eq!(report.retries(), k);
            assert_eq!(report.failures, k);
            assert_eq!(report.attempts, k + 1);
            assert_eq!(backoff.waits(), k as usize);
            assert!(backoff
                .intervals()
                .iter()
                .all(|interval| *interval == Duration::from_secs(10)));
        }
    }

    #[test]
    fn test_gives_up_after_budget() {
        let engine = Arc::new(FakeEngine::new().failing_runs(6));
        let supervisor = Supervisor::new(
            engine.clone(),
            run_params(),
            SupervisorConfig::default(),
            Arc::new(AtomicBool::new(false)),
        );
        let backoff = CountingBackoff::default();
        let report = supervisor.run(&backoff);
        assert!(!report.succeeded());
        assert_eq!(report.outcome, RunOutcome::Exhausted);
        assert_eq!(report.attempts, 6);
        assert_eq!(report.failures, 6);
        assert_eq!(report.retries(), 5);
        // Five retries were waited for; the sixth failure is terminal.
        assert_eq!(backoff.waits(), 5);
        assert_eq!(engine.run_calls(), 6);
    }

    fn logged_errors() -> Vec<String> {
        take_logs()
            .into_iter()
            .filter(|record| record.level == Level::Error)
            .inspect(|record| assert_eq!(record.target, LOG_TARGET))
            .map(|record| record.message)
            .collect()
    }

    #[test]
    fn test_logs_each_failed_attempt() {
        capture_logs();
        for k in 1..=5u32 {
            take_logs();
            let report = supervisor(FakeEngine::new().failing_runs(k as usize))
                .run(&CountingBackoff::default());
            assert!(report.succeeded());

            let errors = logged_errors();
            assert_eq!(errors.len(), k as usize, "k = {k}");
            for (retry, message) in (1..=k).zip(&errors) {
                assert!(
                    message.starts_with(&format!("Unexpected F3 failure, retrying({retry}) in 10s...")),
                    "{message}"
                );
                assert!(message.contains("error=engine run"), "{message}");
            }
        }

        take_logs();
        let report = supervisor(FakeEngine::new().failing_runs(6)).run(&CountingBackoff::default());
        assert!(!report.succeeded());
        let errors = logged_errors();
        assert_eq!(errors.len(), 6);
        for (retry, message) in (1..=5u32).zip(&errors) {
            assert!(message.contains(&format!("retrying({retry})")), "{message}");
        }
        assert!(errors[5].contains("retry budget of 5 spent, giving up"));
        assert!(errors[5].contains("error=engine run 6 failed"));
    }

    #[test]
    fn test_permanent_failure_stops_at_budget() {
        let engine = Arc::new(FakeEngine::new().failing_runs(usize::MAX));
        let config = SupervisorConfig {
            max_retries: 2,
            retry_interval_secs: 1,
        };
        let supervisor = Supervisor::new(
            engine.clone(),
            run_params(),
            config,
            Arc::new(AtomicBool::new(false)),
        );
        let backoff = CountingBackoff::default();
        let report = supervisor.run(&backoff);
        assert_eq!(report.outcome, RunOutcome::Exhausted);
        assert_eq!(engine.run_calls(), 3);
        assert_eq!(backoff.intervals(), vec![Duration::from_secs(1); 2]);
    }

    #[test]
    fn test_engine_receives_run_params() {
        let engine = Arc::new(FakeEngine::new());
        let supervisor = Supervisor::new(
            engine.clone(),
            run_params(),
            SupervisorConfig::default(),
            Arc::new(AtomicBool::new(false)),
        );
        supervisor.run(&CountingBackoff::default());
        assert_eq!(engine.last_params(), Some(run_params()));
    }

    #[test]
    fn test_exit_requested_before_start() {
        let engine = Arc::new(FakeEngine::new());
        let supervisor = Supervisor::new(
            engine.clone(),
            run_params(),
            SupervisorConfig::default(),
            Arc::new(AtomicBool::new(true)),
        );
        let report = supervisor.run(&CountingBackoff::default());
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.attempts, 0);
        assert_eq!(engine.run_calls(), 0);
    }

    #[test]
    fn test_exit_during_backoff() {
        struct ExitingBackoff(AtomicUsize);
        impl Backoff for ExitingBackoff {
            fn wait(&self, _interval: Duration, _exit: &AtomicBool) -> bool {
                self.0.fetch_add(1, Ordering::Relaxed);
                false
            }
        }

        let supervisor = supervisor(FakeEngine::new().failing_runs(3));
        let backoff = ExitingBackoff(AtomicUsize::new(0));
        let report = supervisor.run(&backoff);
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.attempts, 1);
        assert_eq!(backoff.0.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_sleep_backoff_waits_full_interval() {
        let exit = AtomicBool::new(false);
        let started = Instant::now();
        assert!(SleepBackoff.wait(Duration::from_millis(120), &exit));
        assert!(started.elapsed() >= Duration::from_millis(120));
    }

    #[test]
    fn test_sleep_backoff_notices_exit() {
        let exit = AtomicBool::new(true);
        let started = Instant::now();
        assert!(!SleepBackoff.wait(Duration::from_secs(60), &exit));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_spawned_supervisor_reports_on_join() {
        let engine = Arc::new(FakeEngine::new().failing_runs(1));
        let config = SupervisorConfig {
            max_retries: 5,
            retry_interval_secs: 1,
        };
        let handle = Supervisor::new(
            engine.clone(),
            run_params(),
            config,
            Arc::new(AtomicBool::new(false)),
        )
        .spawn()
        .unwrap();
        let report = handle.join().unwrap();
        assert!(report.succeeded());
        assert_eq!(report.attempts, 2);
        assert_eq!(engine.run_calls(), 2);
    }

    #[test]
    fn test_spawned_supervisor_can_be_stopped_mid_backoff() {
        let engine = Arc::new(FakeEngine::new().failing_runs(usize::MAX));
        let handle = Supervisor::new(
            engine,
            run_params(),
            SupervisorConfig::default(),
            Arc::new(AtomicBool::new(false)),
        )
        .spawn()
        .unwrap();
        while !matches!(handle.state(), SupervisorState::Retrying { .. }) {
            thread::sleep(Duration::from_millis(5));
        }
        handle.request_exit();
        let report = handle.join().unwrap();
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.failures, 1);
        assert_eq!(report.retries(), 0);
    }
}
