//! Configuration management for SenderPool
//!
//! - Schema-driven configuration with validation
//! - Layered loading: defaults, TOML file, environment overrides
//!
//! # Examples
//!
//! ```no_run
//! use senderpool_core::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_file("senderpool.toml")
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! println!("{} handles for topic {}", config.pool.capacity, config.pool.topic);
//! ```

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::ConfigValidator;

use crate::Result;

/// Load configuration from the default search paths and the process
/// environment.
///
/// # Errors
/// Returns an error if a file fails to parse or the result fails validation.
pub fn load_default() -> Result<SenderPoolConfig> {
    ConfigLoader::new().load()
}

/// Validate a configuration object.
///
/// # Errors
/// Returns [`crate::Error::Configuration`] on the first violated rule.
pub fn validate(config: &SenderPoolConfig) -> Result<()> {
    ConfigValidator::validate(config)
}
