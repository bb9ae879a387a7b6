//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) and/or process environment
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → MiddlewareConfig (validated, immutable)
//!     → passed explicitly to the log formatter and the trace middleware
//! ```
//!
//! # Design Decisions
//! - Environment variables are read once, at load time, never at call sites
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_with_env, parse_config, ConfigError};
pub use schema::{DynamicNamingConfig, LoggingConfig, MiddlewareConfig, TracingConfig};
pub use validation::{validate_config, ValidationError};
