//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → stop accepting → drain requests → stop running faults
//! ```
//!
//! # Design Decisions
//! - Faults are stopped after the listeners drain, so no request observes a
//!   half-stopped fault
//! - Leaked tasks are not reclaimed; they end with the process

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
