//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `FINTRACK` prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use fintrack::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Renewing every {:?}", config.billing.renewal_interval());
//! ```

mod billing;
mod database;
mod error;
mod runtime;

pub use billing::BillingConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use runtime::{Environment, RuntimeConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Environment and logging
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// PostgreSQL connection
    pub database: DatabaseConfig,

    /// Event processing and renewal sweep tuning
    #[serde(default)]
    pub billing: BillingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `FINTRACK` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `FINTRACK__DATABASE__URL=...` -> `database.url = ...`
    /// - `FINTRACK__BILLING__RENEWAL_BATCH_SIZE=50` -> `billing.renewal_batch_size = 50`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or cannot be
    /// parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("FINTRACK")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration sections
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid value found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.runtime.validate()?;
        self.database.validate()?;
        self.billing.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.runtime.is_production()
    }
}
