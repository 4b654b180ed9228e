//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or RpcConfig built in code
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RpcConfig (validated, immutable)
//!     → shared via Arc<Settings> with every request context
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the client is initialized
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    DomainEntry, ErrorConfig, IntranetEntry, LogConfig, LogDriver, LogLevel, Packager,
    ProxyConfig, RpcConfig, ServerType, SignConfig,
};
pub use validation::{validate_config, ValidationError};
