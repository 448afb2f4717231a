//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("max_conflict_retries must be at most {max}, got {actual}")]
    TooManyConflictRetries { max: u32, actual: u32 },

    #[error("renewal_batch_size must be between 1 and {max}, got {actual}")]
    InvalidBatchSize { max: usize, actual: usize },

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("Invalid log filter '{0}'")]
    InvalidLogFilter(String),
}
