//! Injection subsystem.
//!
//! # Data Flow
//! ```text
//! request (service, endpoint)
//!     → engine.rs (snapshot lookup → enabled? → Bernoulli draw)
//!     → rule.rs   (InjectionRule that fired)
//!     → params.rs (open config map → typed parameters)
//!     → latency.rs / faults::leak / AppError (the actual failure)
//! ```

pub mod engine;
pub mod latency;
pub mod params;
pub mod rule;

use std::time::Duration;

pub use engine::InjectionEngine;
pub use params::{LatencyParams, LeakParams};
pub use rule::{InjectionRule, InjectionType, WILDCARD};

/// Why a triggered injection did not produce its synthetic response.
#[derive(Debug, thiserror::Error)]
pub enum InjectionError {
    /// The request was cancelled while the injected delay was pending.
    #[error("request cancelled after {elapsed:?} of injected delay")]
    Cancelled { elapsed: Duration },

    /// The rule type has no HTTP-level behaviour.
    #[error("no synthetic response for injection type {0}")]
    Unsupported(InjectionType),

    /// Building the synthetic response failed.
    #[error("failed to build injected response: {0}")]
    Build(String),
}
