//! Configuration schema definitions.
//!
//! All sections default, so an empty file is a valid configuration that
//! injects nothing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::faults::LeakShape;
use crate::injection::InjectionRule;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InjectorConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Identity of the wrapped service and where real requests go.
    pub service: ServiceConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Middleware-wide injection settings.
    pub injection: InjectionConfig,

    /// Registry-managed faults.
    pub faults: FaultsConfig,

    /// Injection rules keyed by rule id.
    pub rules: BTreeMap<String, InjectionRule>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl InjectorConfig {
    /// Rules with their ids taken from the map keys.
    pub fn injection_rules(&self) -> Vec<InjectionRule> {
        self.rules
            .iter()
            .map(|(id, rule)| InjectionRule {
                id: id.clone(),
                ..rule.clone()
            })
            .collect()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Wrapped service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name rules are matched against.
    pub name: String,

    /// Upstream address ("host:port") requests are forwarded to. Without one
    /// the built-in echo handler answers.
    pub upstream: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "storage-service".to_string(),
            upstream: None,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed per request, injected delay included, in seconds.
    pub request_secs: u64,

    /// Upstream connection timeout in seconds.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            connect_secs: 5,
        }
    }
}

/// Middleware-wide injection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InjectionConfig {
    /// Wrap the pipeline in the injection middleware.
    pub enabled: bool,

    /// Ceiling on `leak_count` for a single injection.
    pub max_leak_count: usize,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_leak_count: 64,
        }
    }
}

/// Faults registered with the fault manager at startup.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FaultsConfig {
    pub cpu_spike: CpuSpikeConfig,
    pub memory_leak: MemoryLeakConfig,
    pub task_leak: TaskLeakConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CpuSpikeConfig {
    pub enabled: bool,

    /// Work intensity, 1-100.
    pub intensity: u32,

    /// Worker threads; 0 means one per available core.
    pub workers: usize,

    /// Pause between bursts in milliseconds.
    pub interval_ms: u64,
}

impl Default for CpuSpikeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 90,
            workers: 4,
            interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MemoryLeakConfig {
    pub enabled: bool,

    /// Bytes retained per step.
    pub chunk_bytes: usize,

    /// Pause between steps in milliseconds.
    pub interval_ms: u64,

    /// Upper bound on retained bytes.
    pub max_bytes: usize,
}

impl Default for MemoryLeakConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_bytes: 1024 * 1024,
            interval_ms: 15_000,
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskLeakConfig {
    /// Off by default: leaked tasks are never reclaimed.
    pub enabled: bool,
    pub shape: LeakShape,
    pub count: usize,
}

impl Default for TaskLeakConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            shape: LeakShape::InfiniteLoop,
            count: 1,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
