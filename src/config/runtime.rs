//! Runtime configuration

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use super::error::ValidationError;

/// Process-level settings: environment and log filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub environment: Environment,

    /// `tracing` filter directive. Falls back to `RUST_LOG` when unset.
    pub log_level: Option<String>,
}

/// Application environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Build the log filter: configured directive, then `RUST_LOG`, then the default.
    pub fn env_filter(&self) -> Result<EnvFilter, ValidationError> {
        match &self.log_level {
            Some(directive) => EnvFilter::try_new(directive)
                .map_err(|_| ValidationError::InvalidLogFilter(directive.clone())),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_level()))),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.env_filter().map(|_| ())
    }
}

fn default_log_level() -> &'static str {
    "info,fintrack=debug,sqlx=warn"
}
