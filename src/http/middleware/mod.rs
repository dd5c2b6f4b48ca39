//! Router middleware.

pub mod fault_injection;

pub use fault_injection::{fault_injection_middleware, InjectionState, X_FAULT_INJECTED};
