//! Registry-managed fault lifecycles.

use fault_injector::faults::{
    CpuSpikeFault, Fault, FaultError, FaultManager, FaultStatus, MemoryLeakFault,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn test_cpu_spike_lifecycle_through_manager() {
    let manager = FaultManager::new();
    manager.register(Arc::new(CpuSpikeFault::new(20, 2, Duration::from_millis(10))));

    assert_eq!(manager.status("CpuSpike"), Ok(FaultStatus::Stopped));
    manager.start("CpuSpike").unwrap();
    assert_eq!(manager.status("CpuSpike"), Ok(FaultStatus::Running));
    assert_eq!(
        manager.start("CpuSpike"),
        Err(FaultError::AlreadyRunning("CpuSpike".to_string()))
    );

    std::thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    manager.stop("CpuSpike").unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(manager.status("CpuSpike"), Ok(FaultStatus::Stopped));
    assert_eq!(
        manager.stop("CpuSpike"),
        Err(FaultError::NotRunning("CpuSpike".to_string()))
    );

    // Restartable after a clean stop.
    manager.start("CpuSpike").unwrap();
    assert_eq!(manager.stop_all(), 1);
}

#[test]
fn test_full_intensity_stops_promptly() {
    let fault = CpuSpikeFault::new(100, 2, Duration::from_millis(1));
    fault.start().unwrap();
    std::thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    fault.stop().unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[test]
fn test_memory_leak_grows_then_releases() {
    let fault = MemoryLeakFault::new(4096, Duration::from_millis(5), 64 * 1024);
    fault.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while fault.retained_bytes() < 64 * 1024 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(fault.retained_bytes(), 64 * 1024);

    fault.stop().unwrap();
    assert_eq!(fault.retained_bytes(), 0);
    assert_eq!(fault.status(), FaultStatus::Stopped);
}

#[test]
fn test_stop_all_only_touches_running_faults() {
    let manager = FaultManager::new();
    manager.register(Arc::new(CpuSpikeFault::new(10, 1, Duration::from_millis(10))));
    manager.register(Arc::new(MemoryLeakFault::new(
        1024,
        Duration::from_millis(10),
        8 * 1024,
    )));

    manager.start("MemLeak").unwrap();
    assert_eq!(manager.stop_all(), 1);
    assert!(manager
        .list()
        .iter()
        .all(|f| f.status == FaultStatus::Stopped));
}

#[test]
fn test_unknown_fault_name() {
    let manager = FaultManager::new();
    assert_eq!(
        manager.start("Missing"),
        Err(FaultError::NotFound("Missing".to_string()))
    );
}
