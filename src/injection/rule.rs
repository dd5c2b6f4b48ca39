//! Injection rule model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Endpoint or service value that matches anything.
pub const WILDCARD: &str = "*";

/// How a triggered rule corrupts the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionType {
    /// Respond with a synthetic error built from the rule's error template.
    HttpError,
    /// Hold the request for `delay_ms`, then answer with a timeout.
    HttpLatency,
    /// Spawn `leak_count` never-ending tasks of shape `leak_type`.
    #[serde(alias = "task_leak")]
    GoroutineLeak,
    /// Error consumed by storage code through the engine directly; the HTTP
    /// middleware passes these through.
    StorageError,
    /// Any type this build does not know. Loads fine, never injects.
    #[serde(other)]
    Unknown,
}

impl InjectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectionType::HttpError => "http_error",
            InjectionType::HttpLatency => "http_latency",
            InjectionType::GoroutineLeak => "goroutine_leak",
            InjectionType::StorageError => "storage_error",
            InjectionType::Unknown => "unknown",
        }
    }

    /// Whether `InjectionEngine::create_error` yields an error for this type.
    pub fn produces_error(&self) -> bool {
        matches!(self, InjectionType::HttpError | InjectionType::StorageError)
    }
}

impl fmt::Display for InjectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative description of when and how to inject a fault for one
/// (service, endpoint) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionRule {
    /// Filled from the map key when loaded from configuration.
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type")]
    pub injection_type: InjectionType,

    pub service: String,

    pub endpoint: String,

    /// Probability in [0.0, 1.0] that a matching request is hit.
    pub rate: f64,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Type-specific parameters, e.g. `delay_ms`, `leak_type`, `leak_count`.
    #[serde(default)]
    pub config: HashMap<String, Value>,

    #[serde(default)]
    pub error_type: String,

    #[serde(default)]
    pub error_code: String,

    #[serde(default)]
    pub error_msg: String,
}

fn default_enabled() -> bool {
    true
}

impl InjectionRule {
    pub fn new(
        id: impl Into<String>,
        injection_type: InjectionType,
        service: impl Into<String>,
        endpoint: impl Into<String>,
        rate: f64,
    ) -> Self {
        Self {
            id: id.into(),
            injection_type,
            service: service.into(),
            endpoint: endpoint.into(),
            rate,
            enabled: true,
            config: HashMap::new(),
            error_type: String::new(),
            error_code: String::new(),
            error_msg: String::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_error(
        mut self,
        error_type: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.error_type = error_type.into();
        self.error_code = code.into();
        self.error_msg = message.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_from_toml() {
        let rule: InjectionRule = toml::from_str(
            r#"
            type = "http_latency"
            service = "storage-service"
            endpoint = "/api/files/upload"
            rate = 0.25

            [config]
            delay_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(rule.injection_type, InjectionType::HttpLatency);
        assert!(rule.enabled);
        assert_eq!(rule.rate, 0.25);
        assert_eq!(rule.config["delay_ms"], 500);
        assert!(rule.id.is_empty());
    }

    #[test]
    fn test_task_leak_alias() {
        let rule: InjectionRule = serde_json::from_value(serde_json::json!({
            "type": "task_leak",
            "service": "s",
            "endpoint": "/e",
            "rate": 1.0,
            "enabled": false
        }))
        .unwrap();
        assert_eq!(rule.injection_type, InjectionType::GoroutineLeak);
        assert!(!rule.enabled);
    }

    #[test]
    fn test_error_producing_types() {
        assert!(InjectionType::HttpError.produces_error());
        assert!(InjectionType::StorageError.produces_error());
        assert!(!InjectionType::HttpLatency.produces_error());
        assert!(!InjectionType::GoroutineLeak.produces_error());
        assert!(!InjectionType::Unknown.produces_error());
    }

    #[test]
    fn test_unrecognised_type_loads_as_unknown() {
        let rule: InjectionRule = serde_json::from_value(serde_json::json!({
            "type": "dns_error",
            "service": "s",
            "endpoint": "/e",
            "rate": 1.0
        }))
        .unwrap();
        assert_eq!(rule.injection_type, InjectionType::Unknown);
    }
}
