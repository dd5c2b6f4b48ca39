//! Injection decision engine.
//!
//! # Responsibilities
//! - Hold the active rule set behind an atomically swapped snapshot
//! - Resolve (service, endpoint) to a rule in O(1), with wildcard fallbacks
//! - Decide per request: enabled check, then one Bernoulli draw
//! - Build synthetic `AppError`s from error-producing rules
//!
//! # Design Decisions
//! - Readers load the snapshot without locking; writers build a new snapshot
//!   and swap it in, so a reader never sees a half-applied update
//! - Sampling happens exactly once per decision; `decide` returns the rule it
//!   sampled so callers never re-sample or re-fetch
//! - Lookup order: `(service, endpoint)`, `(service, "*")`, `("*", "*")`

use arc_swap::ArcSwap;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

use super::rule::{InjectionRule, InjectionType, WILDCARD};
use crate::error::{AppError, ErrorType};
use crate::observability::metrics;

const DEFAULT_ERROR_CODE: &str = "FAULT_INJECTED";
const DEFAULT_ERROR_MSG: &str = "Injected fault";

#[derive(Debug, Default, Clone)]
struct RuleSet {
    by_id: HashMap<String, Arc<InjectionRule>>,
    /// service -> endpoint -> rule
    by_target: HashMap<String, HashMap<String, Arc<InjectionRule>>>,
}

impl RuleSet {
    fn from_rules(by_id: HashMap<String, Arc<InjectionRule>>) -> Self {
        let mut ids: Vec<&String> = by_id.keys().collect();
        ids.sort();

        let mut by_target: HashMap<String, HashMap<String, Arc<InjectionRule>>> = HashMap::new();
        for id in ids {
            let rule = &by_id[id];
            let endpoints = by_target.entry(rule.service.clone()).or_default();
            if let Some(existing) = endpoints.get(&rule.endpoint) {
                tracing::warn!(
                    service = %rule.service,
                    endpoint = %rule.endpoint,
                    kept = %existing.id,
                    ignored = %rule.id,
                    "Duplicate injection target"
                );
                continue;
            }
            if rule.injection_type == InjectionType::Unknown {
                tracing::warn!(rule = %rule.id, "Rule has an unrecognised type and will never inject");
            }
            endpoints.insert(rule.endpoint.clone(), rule.clone());
        }

        Self { by_id, by_target }
    }

    fn lookup(&self, service: &str, endpoint: &str) -> Option<&Arc<InjectionRule>> {
        let exact = self.by_target.get(service);
        exact
            .and_then(|endpoints| endpoints.get(endpoint))
            .or_else(|| exact.and_then(|endpoints| endpoints.get(WILDCARD)))
            .or_else(|| {
                self.by_target
                    .get(WILDCARD)
                    .and_then(|endpoints| endpoints.get(WILDCARD))
            })
    }
}

/// Holds the rule set and makes per-request injection decisions.
#[derive(Debug, Default)]
pub struct InjectionEngine {
    rules: ArcSwap<RuleSet>,
}

impl InjectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: impl IntoIterator<Item = InjectionRule>) -> Self {
        let engine = Self::new();
        engine.replace_rules(rules);
        engine
    }

    /// Lookup, enabled check and a single Bernoulli sample.
    ///
    /// Takes no request context: cancellation is carried by the request
    /// itself (see `RequestCancellation`), not by the decision.
    pub fn should_inject(&self, service: &str, endpoint: &str) -> bool {
        self.decide(service, endpoint).is_some()
    }

    /// Like [`should_inject`](Self::should_inject), but hands back the rule
    /// that fired, taken from the same snapshot the decision was made on.
    pub fn decide(&self, service: &str, endpoint: &str) -> Option<Arc<InjectionRule>> {
        let snapshot = self.rules.load();
        let rule = snapshot.lookup(service, endpoint)?;
        metrics::record_evaluation();

        if !rule.enabled || !sample(rule.rate) {
            return None;
        }

        metrics::record_triggered(&rule.id, rule.injection_type.as_str());
        tracing::debug!(
            rule = %rule.id,
            service = %service,
            endpoint = %endpoint,
            injection_type = %rule.injection_type,
            "Injection triggered"
        );
        Some(rule.clone())
    }

    /// Rule that would govern (service, endpoint). No sampling.
    pub fn get_injection_rule(&self, service: &str, endpoint: &str) -> Option<Arc<InjectionRule>> {
        self.rules.load().lookup(service, endpoint).cloned()
    }

    /// Synthetic error from the rule's template, or `None` for rule types
    /// that do not produce errors.
    pub fn create_error(&self, rule: &InjectionRule) -> Option<AppError> {
        if !rule.injection_type.produces_error() {
            return None;
        }

        let error_type = if rule.error_type.is_empty() {
            ErrorType::Internal
        } else {
            ErrorType::parse_lenient(&rule.error_type)
        };
        let code = non_empty_or(&rule.error_code, DEFAULT_ERROR_CODE);
        let message = non_empty_or(&rule.error_msg, DEFAULT_ERROR_MSG);

        Some(AppError::new(error_type, code, message))
    }

    /// Swap in a whole new rule set.
    pub fn replace_rules(&self, rules: impl IntoIterator<Item = InjectionRule>) {
        let by_id: HashMap<String, Arc<InjectionRule>> = rules
            .into_iter()
            .map(|rule| (rule.id.clone(), Arc::new(rule)))
            .collect();
        let count = by_id.len();
        self.rules.store(Arc::new(RuleSet::from_rules(by_id)));
        tracing::info!(rules = count, "Injection rules loaded");
    }

    /// Insert or replace a rule by id. Returns the rule it replaced.
    pub fn upsert_rule(&self, rule: InjectionRule) -> Option<Arc<InjectionRule>> {
        let rule = Arc::new(rule);
        let previous = self.rules.rcu(|current| {
            let mut by_id = current.by_id.clone();
            by_id.insert(rule.id.clone(), rule.clone());
            RuleSet::from_rules(by_id)
        });
        previous.by_id.get(&rule.id).cloned()
    }

    /// Remove a rule by id. Returns the removed rule.
    pub fn remove_rule(&self, id: &str) -> Option<Arc<InjectionRule>> {
        let previous = self.rules.rcu(|current| {
            let mut by_id = current.by_id.clone();
            by_id.remove(id);
            RuleSet::from_rules(by_id)
        });
        previous.by_id.get(id).cloned()
    }

    pub fn get_rule(&self, id: &str) -> Option<Arc<InjectionRule>> {
        self.rules.load().by_id.get(id).cloned()
    }

    /// All rules, sorted by id.
    pub fn rules(&self) -> Vec<Arc<InjectionRule>> {
        let mut rules: Vec<Arc<InjectionRule>> = self.rules.load().by_id.values().cloned().collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        rules
    }

    pub fn clear(&self) {
        self.rules.store(Arc::new(RuleSet::default()));
    }

    pub fn len(&self) -> usize {
        self.rules.load().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Uniform draw in [0, 1) compared against `rate`.
fn sample(rate: f64) -> bool {
    if rate.is_nan() || rate <= 0.0 {
        return false;
    }
    if rate >= 1.0 {
        return true;
    }
    rand::thread_rng().gen::<f64>() < rate
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
