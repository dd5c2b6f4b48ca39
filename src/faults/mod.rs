//! Lifecycle-managed synthetic failure generators.
//!
//! # Data Flow
//! ```text
//! admin API / test code
//!     → manager.rs (FaultManager: named registry + inline sampler)
//!     → Fault::start / Fault::stop
//!         → cpu.rs    (bounded CPU bursts on dedicated threads)
//!         → memory.rs (bounded memory growth, released on stop)
//!         → leak.rs   (detached tasks that are never reclaimed)
//! ```
//!
//! # Design Decisions
//! - A fault is `stopped → running → stopped`; misuse is reported, not ignored
//! - Each fault owns its stop signal and waits for its workers on `stop`
//! - `status` is a single atomic load and never blocks
//! - Leak tasks are deliberately outside this lifecycle (see `leak.rs`)

pub mod cpu;
pub mod leak;
pub mod manager;
pub mod memory;

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::{AppError, ErrorType};

pub use cpu::CpuSpikeFault;
pub use leak::{leaked_task_count, spawn_leaks, LeakShape, TaskLeakFault};
pub use manager::{FaultManager, FaultSummary};
pub use memory::MemoryLeakFault;

/// Run state reported by [`Fault::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultStatus {
    Stopped,
    Running,
}

impl fmt::Display for FaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultStatus::Stopped => f.write_str("stopped"),
            FaultStatus::Running => f.write_str("running"),
        }
    }
}

/// Lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FaultError {
    #[error("{0} already running")]
    AlreadyRunning(String),

    #[error("{0} not running")]
    NotRunning(String),

    #[error("fault not found: {0}")]
    NotFound(String),

    #[error("failed to spawn workers for {fault}: {reason}")]
    Spawn { fault: String, reason: String },
}

impl From<FaultError> for AppError {
    fn from(err: FaultError) -> Self {
        let (error_type, code) = match &err {
            FaultError::AlreadyRunning(_) => (ErrorType::Conflict, "FAULT_ALREADY_RUNNING"),
            FaultError::NotRunning(_) => (ErrorType::Conflict, "FAULT_NOT_RUNNING"),
            FaultError::NotFound(_) => (ErrorType::ObjectNotFound, "FAULT_NOT_FOUND"),
            FaultError::Spawn { .. } => (ErrorType::Internal, "FAULT_SPAWN_FAILED"),
        };
        AppError::new(error_type, code, err.to_string())
    }
}

/// A toggleable, self-contained synthetic failure generator.
///
/// `stop` may block until every background worker has exited, so async
/// callers should run it on the blocking pool.
pub trait Fault: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn start(&self) -> Result<(), FaultError>;

    fn stop(&self) -> Result<(), FaultError>;

    fn status(&self) -> FaultStatus;
}

/// Atomic run flag with compare-and-set transitions.
#[derive(Debug, Default)]
pub(crate) struct RunFlag(AtomicBool);

impl RunFlag {
    /// `stopped → running`; false if already running.
    pub(crate) fn try_start(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `running → stopped`; false if not running.
    pub(crate) fn try_stop(&self) -> bool {
        self.0
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn status(&self) -> FaultStatus {
        if self.0.load(Ordering::Acquire) {
            FaultStatus::Running
        } else {
            FaultStatus::Stopped
        }
    }
}

/// One-shot stop signal shared between a fault and its worker threads.
///
/// Workers poll `is_triggered` inside hot loops and park on `wait_timeout`
/// between bursts, so a trigger wakes them without waiting out the interval.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    triggered: AtomicBool,
    lock: Mutex<()>,
    cvar: Condvar,
}

impl StopSignal {
    pub(crate) fn trigger(&self) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.triggered.store(true, Ordering::Release);
        self.cvar.notify_all();
    }

    pub(crate) fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Park for up to `timeout`. Returns true if the signal fired.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let (_guard, _) = self
            .cvar
            .wait_timeout_while(guard, timeout, |_| !self.is_triggered())
            .unwrap_or_else(|e| e.into_inner());
        self.is_triggered()
    }
}
