//! Fault injection for HTTP services.
//!
//! Wraps an axum router in a middleware that, driven by per-endpoint rules,
//! replaces real handling with synthetic errors, injected latency or leaked
//! tasks, and keeps a registry of process-level faults (CPU spikes, memory
//! growth) that can be started and stopped at runtime.

pub mod admin;
pub mod config;
pub mod error;
pub mod faults;
pub mod http;
pub mod injection;
pub mod lifecycle;
pub mod observability;

pub use config::schema::InjectorConfig;
pub use error::{AppError, ErrorType};
pub use faults::{Fault, FaultManager};
pub use http::HttpServer;
pub use injection::{InjectionEngine, InjectionRule, InjectionType};
pub use lifecycle::Shutdown;
