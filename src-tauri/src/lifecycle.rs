use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

pub const SUPERVISOR_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ShutdownReason {
    CloseRequested,
    CorpusMissing,
    PermissionDenied,
    UnhandledPanic,
    RootClosed,
}

/// Process-wide switches read by every thread.
///
/// The running flag only ever goes from true to false. Producers consult both
/// switches before emitting anything; the monitoring switch pauses the trigger
/// sources without ending the session.
#[derive(Debug)]
pub struct RunState {
    running: AtomicBool,
    monitoring: AtomicBool,
}

impl RunState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(true),
            monitoring: AtomicBool::new(true),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Acquire)
    }

    /// True when trigger sources may emit events.
    pub fn accepts_triggers(&self) -> bool {
        self.is_running() && self.is_monitoring()
    }

    /// Clears the running flag. Returns false if it was already cleared.
    pub fn stop(&self, reason: ShutdownReason) -> bool {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if was_running {
            info!(?reason, "running flag cleared");
        }
        was_running
    }

    pub fn set_monitoring(&self, enabled: bool) {
        if !self.is_running() && enabled {
            warn!("ignoring monitoring resume after shutdown started");
            return;
        }
        self.monitoring.store(enabled, Ordering::Release);
        info!(enabled, "trigger monitoring switched");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    KeepRunning,
    Shutdown,
}

/// Periodic liveness check run on the UI context.
#[derive(Debug, Clone, Copy)]
pub struct Supervisor {
    pub interval: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self {
            interval: SUPERVISOR_INTERVAL,
        }
    }
}

impl Supervisor {
    pub fn check(&self, run_state: &RunState, root_alive: bool) -> Verdict {
        if !root_alive {
            run_state.stop(ShutdownReason::RootClosed);
            return Verdict::Shutdown;
        }
        if !run_state.is_running() {
            return Verdict::Shutdown;
        }
        Verdict::KeepRunning
    }
}
