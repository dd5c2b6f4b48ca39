//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → InjectorConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the engine's rule set
//! ```
//!
//! # Design Decisions
//! - Only rules are hot-reloaded; listener and fault settings need a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, CpuSpikeConfig, FaultsConfig, InjectionConfig, InjectorConfig, ListenerConfig,
    MemoryLeakConfig, ObservabilityConfig, ServiceConfig, TaskLeakConfig, TimeoutConfig,
};
pub use validation::{validate_config, validate_rule, ValidationError};
pub use watcher::ConfigWatcher;
