//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Rule sanity: rate range, non-empty match keys, unique targets
//! - Addresses parse, fault parameters are in range
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Malformed rule `config` values are not errors; handlers default them

use axum::http::uri::Authority;
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::config::schema::InjectorConfig;
use crate::injection::InjectionRule;

/// Ceiling on `faults.memory_leak.max_bytes` (16 GiB).
pub const MAX_MEMORY_LEAK_BYTES: u64 = 16 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("rule '{rule}': rate {rate} outside [0.0, 1.0]")]
    InvalidRate { rule: String, rate: f64 },

    #[error("rule '{rule}': {field} must not be empty")]
    EmptyField { rule: String, field: &'static str },

    #[error("rules '{first}' and '{second}' both target {service} {endpoint}")]
    DuplicateTarget {
        first: String,
        second: String,
        service: String,
        endpoint: String,
    },

    #[error("{field}: invalid address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Validate a whole configuration.
pub fn validate_config(config: &InjectorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::InvalidValue {
                field: "admin.api_key",
                reason: "must not be empty when the admin API is enabled".to_string(),
            });
        }
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::InvalidValue {
            field: "service.name",
            reason: "must not be empty".to_string(),
        });
    }
    if let Some(upstream) = &config.service.upstream {
        if upstream.parse::<Authority>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field: "service.upstream",
                value: upstream.clone(),
            });
        }
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::InvalidValue {
            field: "timeouts.request_secs",
            reason: "must be greater than 0".to_string(),
        });
    }
    if !(1..=100).contains(&config.faults.cpu_spike.intensity) {
        errors.push(ValidationError::InvalidValue {
            field: "faults.cpu_spike.intensity",
            reason: format!("{} outside 1..=100", config.faults.cpu_spike.intensity),
        });
    }
    let memory = &config.faults.memory_leak;
    if memory.chunk_bytes == 0 || memory.chunk_bytes > memory.max_bytes {
        errors.push(ValidationError::InvalidValue {
            field: "faults.memory_leak.chunk_bytes",
            reason: format!("{} outside 1..={}", memory.chunk_bytes, memory.max_bytes),
        });
    }
    if memory.max_bytes as u64 > MAX_MEMORY_LEAK_BYTES {
        errors.push(ValidationError::InvalidValue {
            field: "faults.memory_leak.max_bytes",
            reason: format!("{} exceeds {}", memory.max_bytes, MAX_MEMORY_LEAK_BYTES),
        });
    }

    let mut targets: HashMap<(&str, &str), &str> = HashMap::new();
    for (id, rule) in &config.rules {
        if let Err(rule_errors) = validate_rule_as(id, rule) {
            errors.extend(rule_errors);
        }
        // BTreeMap iteration is ordered, so `first` is the id that wins.
        if let Some(first) = targets.insert((&rule.service, &rule.endpoint), id) {
            errors.push(ValidationError::DuplicateTarget {
                first: first.to_string(),
                second: id.clone(),
                service: rule.service.clone(),
                endpoint: rule.endpoint.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a single rule, e.g. one submitted through the admin API.
pub fn validate_rule(rule: &InjectionRule) -> Result<(), Vec<ValidationError>> {
    validate_rule_as(&rule.id, rule)
}

fn validate_rule_as(id: &str, rule: &InjectionRule) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if id.trim().is_empty() {
        errors.push(ValidationError::EmptyField {
            rule: id.to_string(),
            field: "id",
        });
    }
    if !(0.0..=1.0).contains(&rule.rate) {
        errors.push(ValidationError::InvalidRate {
            rule: id.to_string(),
            rate: rule.rate,
        });
    }
    if rule.service.trim().is_empty() {
        errors.push(ValidationError::EmptyField {
            rule: id.to_string(),
            field: "service",
        });
    }
    if rule.endpoint.trim().is_empty() {
        errors.push(ValidationError::EmptyField {
            rule: id.to_string(),
            field: "endpoint",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injection::InjectionType;

    fn rule(service: &str, endpoint: &str, rate: f64) -> InjectionRule {
        InjectionRule::new("", InjectionType::HttpError, service, endpoint, rate)
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&InjectorConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = InjectorConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.rules.insert("bad-rate".into(), rule("svc", "/a", 1.5));
        config.rules.insert("no-endpoint".into(), rule("svc", "", 0.5));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::InvalidRate {
            rule: "bad-rate".into(),
            rate: 1.5
        }));
    }

    #[test]
    fn test_duplicate_targets_rejected() {
        let mut config = InjectorConfig::default();
        config.rules.insert("a".into(), rule("svc", "/x", 0.5));
        config.rules.insert("b".into(), rule("svc", "/x", 0.5));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateTarget {
                first: "a".into(),
                second: "b".into(),
                service: "svc".into(),
                endpoint: "/x".into(),
            }]
        );
    }

    #[test]
    fn test_memory_leak_bounds() {
        let mut config = InjectorConfig::default();
        config.faults.memory_leak.chunk_bytes = usize::MAX;
        config.faults.memory_leak.max_bytes = usize::MAX;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors
            .iter()
            .filter_map(|e| match e {
                ValidationError::InvalidValue { field, .. } => Some(*field),
                _ => None,
            })
            .collect();
        assert_eq!(
            fields,
            vec!["faults.memory_leak.chunk_bytes", "faults.memory_leak.max_bytes"]
        );

        config.faults.memory_leak.chunk_bytes = 0;
        config.faults.memory_leak.max_bytes = 1024;
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }

    #[test]
    fn test_single_rule_needs_id() {
        assert!(validate_rule(&rule("svc", "/a", 0.5)).is_err());
        let mut named = rule("svc", "/a", 0.5);
        named.id = "r1".into();
        assert!(validate_rule(&named).is_ok());
    }
}
