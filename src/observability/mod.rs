//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! engine / middleware / faults produce:
//!     → logging.rs (structured tracing events: rule, service, endpoint, fault)
//!     → metrics.rs (evaluation/trigger counters, fault gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Injected failures are logged at debug; leaks and fallbacks at warn
//! - Request ID flows into every injected error body

pub mod logging;
pub mod metrics;
