//! Fault registry and inline sampler.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, OnceLock};

use super::{Fault, FaultError, FaultStatus};

static GLOBAL: OnceLock<FaultManager> = OnceLock::new();

/// Name and state of a registered fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultSummary {
    pub name: String,
    pub status: FaultStatus,
}

/// Named registry of faults plus a fixed-rate sampler for business logic.
///
/// ```no_run
/// use fault_injector::faults::FaultManager;
///
/// fn save() -> Result<(), &'static str> {
///     if FaultManager::global().should_inject(0.05) {
///         return Err("simulated save failure");
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Default)]
pub struct FaultManager {
    faults: DashMap<String, Arc<dyn Fault>>,
}

impl FaultManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance for inline sampling from business code.
    ///
    /// Starts empty: faults configured for `HttpServer` live in the server's
    /// own registry (`HttpServer::faults`, the admin API), not here.
    pub fn global() -> &'static FaultManager {
        GLOBAL.get_or_init(FaultManager::new)
    }

    /// Independent Bernoulli trial with success probability `rate`.
    pub fn should_inject(&self, rate: f64) -> bool {
        if rate.is_nan() || rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        fastrand::f64() < rate
    }

    /// Register a fault under its own name, replacing any previous holder.
    pub fn register(&self, fault: Arc<dyn Fault>) -> Option<Arc<dyn Fault>> {
        let name = fault.name().to_string();
        tracing::debug!(fault = %name, "Fault registered");
        self.faults.insert(name, fault)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Fault>> {
        self.faults.get(name).map(|entry| entry.value().clone())
    }

    pub fn start(&self, name: &str) -> Result<(), FaultError> {
        self.lookup(name)?.start()
    }

    /// Blocks until the fault's workers have exited.
    pub fn stop(&self, name: &str) -> Result<(), FaultError> {
        self.lookup(name)?.stop()
    }

    pub fn status(&self, name: &str) -> Result<FaultStatus, FaultError> {
        Ok(self.lookup(name)?.status())
    }

    /// All registered faults, sorted by name.
    pub fn list(&self) -> Vec<FaultSummary> {
        let mut list: Vec<FaultSummary> = self
            .faults
            .iter()
            .map(|entry| FaultSummary {
                name: entry.key().clone(),
                status: entry.value().status(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Stop every running fault. Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        // Collect first so no map shard is held while workers are joined.
        let running: Vec<Arc<dyn Fault>> = self
            .faults
            .iter()
            .filter(|entry| entry.value().status() == FaultStatus::Running)
            .map(|entry| entry.value().clone())
            .collect();

        running
            .iter()
            .filter(|fault| match fault.stop() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(fault = fault.name(), error = %e, "Failed to stop fault");
                    false
                }
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.faults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    fn lookup(&self, name: &str) -> Result<Arc<dyn Fault>, FaultError> {
        self.get(name)
            .ok_or_else(|| FaultError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faults::CpuSpikeFault;
    use std::time::Duration;

    #[test]
    fn test_should_inject_extremes() {
        let manager = FaultManager::new();
        for _ in 0..1000 {
            assert!(manager.should_inject(1.0));
            assert!(!manager.should_inject(0.0));
            assert!(!manager.should_inject(-0.5));
            assert!(!manager.should_inject(f64::NAN));
        }
    }

    #[test]
    fn test_should_inject_rate() {
        let manager = FaultManager::global();
        let trials = 20_000;
        let hits = (0..trials).filter(|_| manager.should_inject(0.05)).count();
        // 0.05 * 20000 = 1000, sigma ~ 30.8
        assert!((900..=1100).contains(&hits), "hits = {}", hits);
    }

    #[test]
    fn test_registry_lifecycle() {
        let manager = FaultManager::new();
        manager.register(Arc::new(CpuSpikeFault::new(5, 1, Duration::from_millis(5))));

        assert_eq!(manager.status("CpuSpike"), Ok(FaultStatus::Stopped));
        manager.start("CpuSpike").unwrap();
        assert_eq!(manager.status("CpuSpike"), Ok(FaultStatus::Running));
        assert_eq!(
            manager.list(),
            vec![FaultSummary {
                name: "CpuSpike".into(),
                status: FaultStatus::Running
            }]
        );

        assert_eq!(manager.stop_all(), 1);
        assert_eq!(manager.status("CpuSpike"), Ok(FaultStatus::Stopped));
        assert_eq!(manager.stop_all(), 0);
    }

    #[test]
    fn test_unknown_fault() {
        let manager = FaultManager::new();
        assert_eq!(manager.start("Nope"), Err(FaultError::NotFound("Nope".into())));
        assert_eq!(manager.status("Nope"), Err(FaultError::NotFound("Nope".into())));
    }
}
