//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup)
//!     → request.rs (request ID, cancellation token)
//!     → middleware/fault_injection.rs (rule check, synthetic failure)
//!     → wrapped service (upstream forward or echo)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::{RequestCancellation, RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
