//! Memory leak fault.
//!
//! A single background thread appends `chunk_bytes` to a retained buffer every
//! `interval` until it reaches `max_bytes` or the fault is stopped. Stopping
//! drops the buffer, so unlike task leaks this drain is fully recoverable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::{Fault, FaultError, FaultStatus, RunFlag, StopSignal};
use crate::observability::metrics;

#[derive(Debug)]
struct Worker {
    stop: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
pub struct MemoryLeakFault {
    state: RunFlag,
    chunk_bytes: usize,
    interval: Duration,
    max_bytes: usize,
    retained: Arc<AtomicUsize>,
    worker: Mutex<Option<Worker>>,
}

impl MemoryLeakFault {
    pub fn new(chunk_bytes: usize, interval: Duration, max_bytes: usize) -> Self {
        Self {
            state: RunFlag::default(),
            chunk_bytes: chunk_bytes.max(1),
            interval: interval.max(Duration::from_millis(1)),
            max_bytes,
            retained: Arc::new(AtomicUsize::new(0)),
            worker: Mutex::new(None),
        }
    }

    /// Bytes currently held by the leak.
    pub fn retained_bytes(&self) -> usize {
        self.retained.load(Ordering::Relaxed)
    }
}

impl Fault for MemoryLeakFault {
    fn name(&self) -> &str {
        "MemLeak"
    }

    fn start(&self) -> Result<(), FaultError> {
        let mut slot = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if !self.state.try_start() {
            return Err(FaultError::AlreadyRunning(self.name().to_string()));
        }

        let stop = Arc::new(StopSignal::default());
        let worker_stop = stop.clone();
        let retained = self.retained.clone();
        let (chunk, interval, max) = (self.chunk_bytes, self.interval, self.max_bytes);

        let spawned = std::thread::Builder::new()
            .name("mem-leak".to_string())
            .spawn(move || grow(&worker_stop, &retained, chunk, interval, max));

        match spawned {
            Ok(handle) => {
                *slot = Some(Worker { stop, handle });
                tracing::info!(
                    fault = self.name(),
                    chunk_bytes = self.chunk_bytes,
                    max_bytes = self.max_bytes,
                    "Fault started"
                );
                metrics::record_fault_state(self.name(), true);
                Ok(())
            }
            Err(e) => {
                self.state.try_stop();
                Err(FaultError::Spawn {
                    fault: self.name().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn stop(&self) -> Result<(), FaultError> {
        let mut slot = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if !self.state.try_stop() {
            return Err(FaultError::NotRunning(self.name().to_string()));
        }

        if let Some(worker) = slot.take() {
            worker.stop.trigger();
            if worker.handle.join().is_err() {
                tracing::warn!(fault = self.name(), "Memory leak worker panicked");
            }
        }

        tracing::info!(fault = self.name(), "Fault stopped, memory released");
        metrics::record_fault_state(self.name(), false);
        Ok(())
    }

    fn status(&self) -> FaultStatus {
        self.state.status()
    }
}

fn grow(stop: &StopSignal, retained: &AtomicUsize, chunk: usize, interval: Duration, max: usize) {
    let mut held: Vec<Vec<u8>> = Vec::new();
    let mut warned = false;

    while !stop.wait_timeout(interval) {
        let within_cap = retained
            .load(Ordering::Relaxed)
            .checked_add(chunk)
            .is_some_and(|next| next <= max);
        if !within_cap {
            continue;
        }

        let mut block = Vec::new();
        if let Err(e) = block.try_reserve_exact(chunk) {
            if !warned {
                tracing::warn!(chunk_bytes = chunk, error = %e, "Memory leak allocation failed");
                warned = true;
            }
            continue;
        }
        // Non-zero fill so the pages are actually committed.
        block.resize(chunk, 0xA5u8);
        held.push(block);
        retained.fetch_add(chunk, Ordering::Relaxed);
    }

    drop(held);
    retained.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grows_until_cap_then_releases() {
        let fault = MemoryLeakFault::new(1024, Duration::from_millis(2), 8 * 1024);
        fault.start().unwrap();
        std::thread::sleep(Duration::from_millis(150));

        let held = fault.retained_bytes();
        assert!(held > 0);
        assert!(held <= 8 * 1024);

        fault.stop().unwrap();
        assert_eq!(fault.retained_bytes(), 0);
    }

    #[test]
    fn test_oversized_chunk_is_skipped() {
        let fault = MemoryLeakFault::new(usize::MAX, Duration::from_millis(2), usize::MAX);
        fault.start().unwrap();
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(fault.retained_bytes(), 0);
        fault.stop().unwrap();
    }

    #[test]
    fn test_lifecycle_misuse() {
        let fault = MemoryLeakFault::new(16, Duration::from_millis(50), 1024);
        assert_eq!(fault.stop(), Err(FaultError::NotRunning("MemLeak".into())));
        fault.start().unwrap();
        assert_eq!(fault.start(), Err(FaultError::AlreadyRunning("MemLeak".into())));
        fault.stop().unwrap();
    }
}
