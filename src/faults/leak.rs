//! Task leak shapes.
//!
//! # Hazard
//! Leaked tasks are never reclaimed. Nothing keeps a handle to them and none
//! of them observes a stop signal; they live until the runtime that owns them
//! is dropped. That is the point: they model an unrecoverable resource drain.
//! Only trigger them in disposable test processes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use super::{Fault, FaultError, FaultStatus, RunFlag};
use crate::observability::metrics;

static LEAKED_TASKS: AtomicUsize = AtomicUsize::new(0);

const MEMORY_GROWTH_CHUNK: usize = 1024 * 1024;

/// What a leaked task does for the rest of its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeakShape {
    /// Loops forever with a brief sleep between spins.
    #[default]
    InfiniteLoop,
    /// Waits on a channel whose sender it holds itself.
    BlockingChannel,
    /// Selects over receivers that never fire.
    InfiniteSelect,
    /// Allocates 1 MiB every 100ms and never frees it.
    MemoryGrowth,
}

impl LeakShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeakShape::InfiniteLoop => "infinite_loop",
            LeakShape::BlockingChannel => "blocking_channel",
            LeakShape::InfiniteSelect => "infinite_select",
            LeakShape::MemoryGrowth => "memory_growth",
        }
    }
}

impl fmt::Display for LeakShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown leak type: {0}")]
pub struct UnknownLeakShape(pub String);

impl FromStr for LeakShape {
    type Err = UnknownLeakShape;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "infinite_loop" => Ok(LeakShape::InfiniteLoop),
            "blocking_channel" => Ok(LeakShape::BlockingChannel),
            "infinite_select" => Ok(LeakShape::InfiniteSelect),
            "memory_growth" => Ok(LeakShape::MemoryGrowth),
            other => Err(UnknownLeakShape(other.to_string())),
        }
    }
}

/// Total leak tasks spawned by this process.
pub fn leaked_task_count() -> usize {
    LEAKED_TASKS.load(Ordering::Relaxed)
}

/// Spawn `count` detached tasks of the given shape on `handle`.
///
/// Returns immediately; the join handles are dropped on purpose.
pub fn spawn_leaks(handle: &Handle, shape: LeakShape, count: usize) -> usize {
    for _ in 0..count {
        match shape {
            LeakShape::InfiniteLoop => {
                handle.spawn(async {
                    let mut spins: u64 = 0;
                    loop {
                        spins = std::hint::black_box(spins.wrapping_add(1));
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                });
            }
            LeakShape::BlockingChannel => {
                handle.spawn(async {
                    let (tx, mut rx) = mpsc::channel::<()>(1);
                    let _ = rx.recv().await;
                    drop(tx);
                });
            }
            LeakShape::InfiniteSelect => {
                handle.spawn(async {
                    let (tx_a, rx_a) = oneshot::channel::<()>();
                    let (tx_b, rx_b) = oneshot::channel::<()>();
                    tokio::select! {
                        _ = rx_a => {}
                        _ = rx_b => {}
                    }
                    drop((tx_a, tx_b));
                });
            }
            LeakShape::MemoryGrowth => {
                handle.spawn(async {
                    let mut held: Vec<Vec<u8>> = Vec::new();
                    loop {
                        held.push(vec![1u8; MEMORY_GROWTH_CHUNK]);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                });
            }
        }
    }

    LEAKED_TASKS.fetch_add(count, Ordering::Relaxed);
    metrics::record_leaked_tasks(shape.as_str(), count);
    tracing::warn!(leak_type = %shape, leak_count = count, "Leaked background tasks");
    count
}

/// Registry-startable wrapper around [`spawn_leaks`].
///
/// `start` leaks `count` tasks. `stop` only flips the run flag: the tasks it
/// leaked keep running.
#[derive(Debug)]
pub struct TaskLeakFault {
    state: RunFlag,
    shape: LeakShape,
    count: usize,
}

impl TaskLeakFault {
    pub fn new(shape: LeakShape, count: usize) -> Self {
        Self {
            state: RunFlag::default(),
            shape,
            count,
        }
    }
}

impl Fault for TaskLeakFault {
    fn name(&self) -> &str {
        "TaskLeak"
    }

    fn start(&self) -> Result<(), FaultError> {
        let handle = Handle::try_current().map_err(|e| FaultError::Spawn {
            fault: self.name().to_string(),
            reason: e.to_string(),
        })?;
        if !self.state.try_start() {
            return Err(FaultError::AlreadyRunning(self.name().to_string()));
        }

        spawn_leaks(&handle, self.shape, self.count);
        metrics::record_fault_state(self.name(), true);
        Ok(())
    }

    fn stop(&self) -> Result<(), FaultError> {
        if !self.state.try_stop() {
            return Err(FaultError::NotRunning(self.name().to_string()));
        }
        tracing::warn!(
            fault = self.name(),
            leak_type = %self.shape,
            "Fault marked stopped; leaked tasks are not reclaimed"
        );
        metrics::record_fault_state(self.name(), false);
        Ok(())
    }

    fn status(&self) -> FaultStatus {
        self.state.status()
    }
}
