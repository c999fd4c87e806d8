//! Process supervision
//!
//! Owns at most one forwarder handle and one dashboard handle, and drives
//! them through an explicit state machine: `Stopped → Starting → Running
//! → Stopping → Stopped`, with `Failed` reachable from `Starting` when
//! the health gate times out. The transitions are a pure function over
//! events; the `Supervisor` methods are the effectful driver.
//!
//! Shutdown is interrupt-then-kill: each stop sends SIGINT, waits a
//! bounded grace period, and force-kills on deadline. The forwarder gets
//! a longer grace than the dashboard because it may be draining in-flight
//! requests.

mod health;

pub use health::wait_for_healthy;

use std::time::Duration;

use tokio::process::{Child, Command};

use crate::error::ControlError;

/// Default forwarder invocation, overridable for tests
const FORWARDER_PROGRAM: &str = "openai-forward";
const DASHBOARD_PROGRAM: &str = "openai-forward-ui";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);
const FORWARDER_GRACE: Duration = Duration::from_secs(15);
const DASHBOARD_GRACE: Duration = Duration::from_secs(5);

// ─────────────────────────────────────────────────────────────────────────────
// State machine
// ─────────────────────────────────────────────────────────────────────────────

/// Which managed process a handle or operation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    Forwarder,
    Dashboard,
}

impl std::fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessKind::Forwarder => write!(f, "forwarder"),
            ProcessKind::Dashboard => write!(f, "dashboard"),
        }
    }
}

/// Stop targets, `Both` covering the `run` teardown path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTarget {
    Forwarder,
    Dashboard,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEvent {
    Spawned,
    HealthConfirmed,
    HealthTimedOut,
    StopRequested,
    Exited,
}

impl ProcessState {
    /// Pure transition function; events that do not apply in the current
    /// state leave it unchanged.
    pub fn transition(self, event: ProcessEvent) -> ProcessState {
        use ProcessEvent::*;
        use ProcessState::*;
        match (self, event) {
            (Stopped, Spawned) => Starting,
            (Starting, HealthConfirmed) => Running,
            (Starting, HealthTimedOut) => Failed,
            (Running, StopRequested) => Stopping,
            (Running | Starting | Stopping, Exited) => Stopped,
            (state, _) => state,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handles
// ─────────────────────────────────────────────────────────────────────────────

/// A live managed child process
pub struct ProcessHandle {
    pub kind: ProcessKind,
    pub port: u16,
    pub state: ProcessState,
    child: Child,
}

impl ProcessHandle {
    /// Whether the child is still running (non-blocking poll)
    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Deliver an interrupt to the child. On unix this is SIGINT, giving
    /// the process a chance to drain; elsewhere there is no equivalent
    /// signal, so the kill is initiated directly.
    fn interrupt(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            if let Some(pid) = self.child.id() {
                kill(Pid::from_raw(pid as i32), Signal::SIGINT)
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
            }
            Ok(())
        }
        #[cfg(not(unix))]
        {
            self.child.start_kill()
        }
    }
}

/// Forwarder start parameters, derived from the CLI and the projected
/// configuration environment.
pub struct StartOptions {
    pub port: u16,
    pub workers: u16,
    /// Projected configuration, handed to the child's startup environment.
    /// The parent's own environment is never mutated.
    pub env: Vec<(String, String)>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Supervisor
// ─────────────────────────────────────────────────────────────────────────────

/// Effectful driver owning the managed process handles
pub struct Supervisor {
    forwarder: Option<ProcessHandle>,
    dashboard: Option<ProcessHandle>,
    forwarder_program: String,
    dashboard_program: String,
    /// Decided once from platform detection; on Windows the health gate
    /// is suppressed because process-group signaling there makes the
    /// check unreliable.
    health_check_required: bool,
    health_timeout: Duration,
    forwarder_grace: Duration,
    dashboard_grace: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            forwarder: None,
            dashboard: None,
            forwarder_program: FORWARDER_PROGRAM.to_string(),
            dashboard_program: DASHBOARD_PROGRAM.to_string(),
            health_check_required: !cfg!(windows),
            health_timeout: HEALTH_TIMEOUT,
            forwarder_grace: FORWARDER_GRACE,
            dashboard_grace: DASHBOARD_GRACE,
        }
    }

    pub fn forwarder_state(&self) -> ProcessState {
        self.forwarder
            .as_ref()
            .map_or(ProcessState::Stopped, |h| h.state)
    }

    /// Start the forwarder and gate on its liveness endpoint.
    ///
    /// Rejects a second start while a live handle exists. On health
    /// timeout the handle transitions to `Failed` and the error is
    /// fatal, unless the health gate is suppressed for the platform.
    pub async fn start(&mut self, opts: StartOptions) -> Result<(), ControlError> {
        if let Some(handle) = self.forwarder.as_mut() {
            if handle.is_running() {
                return Err(ControlError::AlreadyRunning(ProcessKind::Forwarder));
            }
            self.forwarder = None;
        }

        let mut command = Command::new(&self.forwarder_program);
        command
            .arg("--host")
            .arg("0.0.0.0")
            .arg("--port")
            .arg(opts.port.to_string())
            .arg("--workers")
            .arg(opts.workers.to_string())
            .envs(opts.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        // TLS material is operator-provided, not part of the projection
        if let (Ok(keyfile), Ok(certfile)) = (
            std::env::var("ssl_keyfile"),
            std::env::var("ssl_certfile"),
        ) {
            command
                .arg("--ssl-keyfile")
                .arg(keyfile)
                .arg("--ssl-certfile")
                .arg(certfile);
        }

        let child = command.spawn().map_err(|source| ControlError::Spawn {
            kind: ProcessKind::Forwarder,
            source,
        })?;

        let mut handle = ProcessHandle {
            kind: ProcessKind::Forwarder,
            port: opts.port,
            state: ProcessState::Stopped.transition(ProcessEvent::Spawned),
            child,
        };
        tracing::info!(port = opts.port, workers = opts.workers, "forwarder spawned");

        let url = format!("http://localhost:{}/healthz", opts.port);
        match wait_for_healthy(&url, self.health_timeout).await {
            Ok(()) => {
                handle.state = handle.state.transition(ProcessEvent::HealthConfirmed);
                tracing::info!(%url, "forwarder healthy");
            }
            Err(err) if self.health_check_required => {
                handle.state = handle.state.transition(ProcessEvent::HealthTimedOut);
                // A forwarder that never became healthy must not outlive
                // the failed start, still bound to the port
                if let Err(kill_err) = handle.child.kill().await {
                    tracing::warn!(error = %kill_err, "could not kill unhealthy forwarder");
                }
                self.forwarder = Some(handle);
                return Err(err);
            }
            Err(_) => {
                // Suppressed: report running rather than failing startup
                handle.state = handle.state.transition(ProcessEvent::HealthConfirmed);
                tracing::warn!(%url, "health check suppressed on this platform");
            }
        }

        self.forwarder = Some(handle);
        Ok(())
    }

    /// Start the dashboard on its UI port. No health gate: UI readiness
    /// is not load-bearing.
    pub async fn start_dashboard(&mut self, ui_port: u16) -> Result<(), ControlError> {
        if let Some(handle) = self.dashboard.as_mut() {
            if handle.is_running() {
                return Err(ControlError::AlreadyRunning(ProcessKind::Dashboard));
            }
            self.dashboard = None;
        }

        let child = Command::new(&self.dashboard_program)
            .arg("--port")
            .arg(ui_port.to_string())
            .spawn()
            .map_err(|source| ControlError::Spawn {
                kind: ProcessKind::Dashboard,
                source,
            })?;

        let mut state = ProcessState::Stopped.transition(ProcessEvent::Spawned);
        state = state.transition(ProcessEvent::HealthConfirmed);
        self.dashboard = Some(ProcessHandle {
            kind: ProcessKind::Dashboard,
            port: ui_port,
            state,
            child,
        });
        tracing::info!(port = ui_port, "dashboard spawned");
        Ok(())
    }

    /// Stop the targeted processes: interrupt, bounded grace wait, then
    /// force kill. A handle whose process already exited is a no-op.
    /// Exceeding the grace period is recovered, never an error.
    pub async fn stop(&mut self, target: StopTarget) -> Result<(), ControlError> {
        let mut outcome = Ok(());
        if matches!(target, StopTarget::Forwarder | StopTarget::Both) {
            if let Some(handle) = self.forwarder.take() {
                outcome = stop_handle(handle, self.forwarder_grace).await;
            }
        }
        // The dashboard is stopped even if the forwarder's stop errored
        if matches!(target, StopTarget::Dashboard | StopTarget::Both) {
            if let Some(handle) = self.dashboard.take() {
                let result = stop_handle(handle, self.dashboard_grace).await;
                outcome = outcome.and(result);
            }
        }
        outcome
    }

    /// Stop the forwarder fully, then start it with the new options.
    /// Sequential and non-overlapping, so two processes never race on
    /// the same port.
    pub async fn restart(&mut self, opts: StartOptions) -> Result<(), ControlError> {
        self.stop(StopTarget::Forwarder).await?;
        self.start(opts).await
    }
}

async fn stop_handle(mut handle: ProcessHandle, grace: Duration) -> Result<(), ControlError> {
    if !handle.is_running() {
        tracing::debug!(kind = %handle.kind, "already exited");
        return Ok(());
    }

    handle.state = handle.state.transition(ProcessEvent::StopRequested);
    if let Err(err) = handle.interrupt() {
        // The process can exit between the liveness poll and the signal
        // (ESRCH); treat a failed interrupt as already-exited and let
        // the wait below confirm it.
        tracing::debug!(kind = %handle.kind, error = %err, "interrupt failed, assuming exited");
    }

    match tokio::time::timeout(grace, handle.child.wait()).await {
        Ok(status) => {
            status?;
            tracing::info!(kind = %handle.kind, port = handle.port, "exited within grace period");
        }
        Err(_) => {
            tracing::warn!(
                kind = %handle.kind,
                grace_secs = grace.as_secs(),
                "did not exit within grace period, killing"
            );
            handle.child.kill().await?;
        }
    }
    handle.state = handle.state.transition(ProcessEvent::Exited);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
