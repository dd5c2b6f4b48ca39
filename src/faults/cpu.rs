//! CPU saturation fault.
//!
//! Spawns `worker_count` OS threads. Each one waits out `work_interval`, then
//! burns a burst of floating point work sized by `intensity`. Threads keep CPU
//! bursts off the async runtime's workers.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::{Fault, FaultError, FaultStatus, RunFlag, StopSignal};
use crate::observability::metrics;

const DEFAULT_INTENSITY: u32 = 80;
const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Intensity above which bursts double in size.
const HIGH_INTENSITY_THRESHOLD: u32 = 50;

#[derive(Debug)]
struct Workers {
    stop: Arc<StopSignal>,
    handles: Vec<JoinHandle<()>>,
}

/// Bounded, cooperatively cancellable CPU spike.
#[derive(Debug)]
pub struct CpuSpikeFault {
    state: RunFlag,
    intensity: u32,
    worker_count: usize,
    work_interval: Duration,
    workers: Mutex<Option<Workers>>,
}

impl CpuSpikeFault {
    /// Out-of-range parameters are replaced with defaults: intensity outside
    /// 1..=100 becomes 80, zero workers becomes the available parallelism and
    /// an interval under 1ms becomes 100ms.
    pub fn new(intensity: u32, worker_count: usize, work_interval: Duration) -> Self {
        let intensity = if (1..=100).contains(&intensity) {
            intensity
        } else {
            DEFAULT_INTENSITY
        };
        let worker_count = if worker_count == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            worker_count
        };
        let work_interval = if work_interval < Duration::from_millis(1) {
            DEFAULT_INTERVAL
        } else {
            work_interval
        };

        Self {
            state: RunFlag::default(),
            intensity,
            worker_count,
            work_interval,
            workers: Mutex::new(None),
        }
    }

    pub fn intensity(&self) -> u32 {
        self.intensity
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn work_interval(&self) -> Duration {
        self.work_interval
    }

    fn spawn_workers(&self) -> Result<Workers, FaultError> {
        let stop = Arc::new(StopSignal::default());
        let mut handles = Vec::with_capacity(self.worker_count);

        for id in 0..self.worker_count {
            let worker_stop = stop.clone();
            let intensity = self.intensity;
            let interval = self.work_interval;
            let spawned = std::thread::Builder::new()
                .name(format!("cpu-spike-{id}"))
                .spawn(move || cpu_worker(&worker_stop, intensity, interval));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Unwind the workers that did start.
                    stop.trigger();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(FaultError::Spawn {
                        fault: self.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(Workers { stop, handles })
    }
}

impl Fault for CpuSpikeFault {
    fn name(&self) -> &str {
        "CpuSpike"
    }

    fn start(&self) -> Result<(), FaultError> {
        let mut slot = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        if !self.state.try_start() {
            return Err(FaultError::AlreadyRunning(self.name().to_string()));
        }

        match self.spawn_workers() {
            Ok(workers) => {
                *slot = Some(workers);
                tracing::info!(
                    fault = self.name(),
                    intensity = self.intensity,
                    workers = self.worker_count,
                    interval_ms = self.work_interval.as_millis() as u64,
                    "Fault started"
                );
                metrics::record_fault_state(self.name(), true);
                Ok(())
            }
            Err(e) => {
                self.state.try_stop();
                Err(e)
            }
        }
    }

    fn stop(&self) -> Result<(), FaultError> {
        let mut slot = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        if !self.state.try_stop() {
            return Err(FaultError::NotRunning(self.name().to_string()));
        }

        if let Some(workers) = slot.take() {
            workers.stop.trigger();
            for handle in workers.handles {
                if handle.join().is_err() {
                    tracing::warn!(fault = self.name(), "CPU worker panicked");
                }
            }
        }

        tracing::info!(fault = self.name(), "Fault stopped");
        metrics::record_fault_state(self.name(), false);
        Ok(())
    }

    fn status(&self) -> FaultStatus {
        self.state.status()
    }
}

fn cpu_worker(stop: &StopSignal, intensity: u32, interval: Duration) {
    loop {
        if stop.wait_timeout(interval) {
            return;
        }
        burn(intensity, stop);
    }
}

/// Number of outer iterations a burst performs for the given intensity.
pub(crate) fn burst_cycles(intensity: u32) -> u32 {
    if intensity > HIGH_INTENSITY_THRESHOLD {
        intensity * 2000
    } else {
        intensity * 1000
    }
}

fn burn(intensity: u32, stop: &StopSignal) {
    for i in 0..burst_cycles(intensity) {
        let mut acc = 0.0f64;
        for j in 0..100u32 {
            acc += f64::from(i) * f64::from(j) / (f64::from(i) + f64::from(j) + 1.0);
        }
        std::hint::black_box(acc);

        if stop.is_triggered() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_defaults() {
        let fault = CpuSpikeFault::new(0, 0, Duration::ZERO);
        assert_eq!(fault.intensity(), 80);
        assert!(fault.worker_count() >= 1);
        assert_eq!(fault.work_interval(), Duration::from_millis(100));

        let fault = CpuSpikeFault::new(101, 2, Duration::from_millis(5));
        assert_eq!(fault.intensity(), 80);
        assert_eq!(fault.worker_count(), 2);
        assert_eq!(fault.work_interval(), Duration::from_millis(5));
    }

    #[test]
    fn test_burst_scaling() {
        assert_eq!(burst_cycles(10), 10_000);
        assert_eq!(burst_cycles(50), 50_000);
        assert_eq!(burst_cycles(51), 102_000);
        assert_eq!(burst_cycles(100), 200_000);
    }

    #[test]
    fn test_double_start_rejected() {
        let fault = CpuSpikeFault::new(10, 2, Duration::from_millis(5));
        assert!(fault.start().is_ok());
        assert_eq!(
            fault.start(),
            Err(FaultError::AlreadyRunning("CpuSpike".into()))
        );
        assert_eq!(fault.status(), FaultStatus::Running);

        assert!(fault.stop().is_ok());
        assert_eq!(fault.status(), FaultStatus::Stopped);

        // A fresh cycle is allowed after stop.
        assert!(fault.start().is_ok());
        assert!(fault.stop().is_ok());
    }

    #[test]
    fn test_stop_without_start_rejected() {
        let fault = CpuSpikeFault::new(10, 1, Duration::from_millis(5));
        assert_eq!(fault.stop(), Err(FaultError::NotRunning("CpuSpike".into())));
        assert_eq!(fault.status(), FaultStatus::Stopped);

        fault.start().unwrap();
        fault.stop().unwrap();
        assert_eq!(fault.stop(), Err(FaultError::NotRunning("CpuSpike".into())));
    }

    #[test]
    fn test_stop_interrupts_high_intensity_burst() {
        let fault = CpuSpikeFault::new(100, 2, Duration::from_millis(1));
        fault.start().unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let started = std::time::Instant::now();
        fault.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
