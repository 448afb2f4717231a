//! Billing worker configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const MAX_CONFLICT_RETRIES: u32 = 10;
const MAX_RENEWAL_BATCH_SIZE: usize = 1000;

/// Tuning for event processing and the renewal sweep
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Reload-and-retry attempts after a version conflict
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    /// Age after which an unfinished ledger claim may be taken over
    #[serde(default = "default_stale_claim_secs")]
    pub stale_claim_secs: u64,

    /// Seconds between renewal sweeps
    #[serde(default = "default_renewal_interval_secs")]
    pub renewal_interval_secs: u64,

    /// Subscriptions renewed per sweep
    #[serde(default = "default_renewal_batch_size")]
    pub renewal_batch_size: usize,

    /// Ledger records older than this are pruned
    #[serde(default = "default_ledger_retention_days")]
    pub ledger_retention_days: u32,
}

impl BillingConfig {
    pub fn renewal_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_conflict_retries > MAX_CONFLICT_RETRIES {
            return Err(ValidationError::TooManyConflictRetries {
                max: MAX_CONFLICT_RETRIES,
                actual: self.max_conflict_retries,
            });
        }
        if self.renewal_batch_size == 0 || self.renewal_batch_size > MAX_RENEWAL_BATCH_SIZE {
            return Err(ValidationError::InvalidBatchSize {
                max: MAX_RENEWAL_BATCH_SIZE,
                actual: self.renewal_batch_size,
            });
        }
        if self.stale_claim_secs == 0 {
            return Err(ValidationError::ZeroInterval("stale_claim_secs"));
        }
        if self.renewal_interval_secs == 0 {
            return Err(ValidationError::ZeroInterval("renewal_interval_secs"));
        }
        if self.ledger_retention_days == 0 {
            return Err(ValidationError::ZeroInterval("ledger_retention_days"));
        }
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            stale_claim_secs: default_stale_claim_secs(),
            renewal_interval_secs: default_renewal_interval_secs(),
            renewal_batch_size: default_renewal_batch_size(),
            ledger_retention_days: default_ledger_retention_days(),
        }
    }
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_stale_claim_secs() -> u64 {
    300
}

fn default_renewal_interval_secs() -> u64 {
    3600
}

fn default_renewal_batch_size() -> usize {
    100
}

fn default_ledger_retention_days() -> u32 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BillingConfig::default();
        assert_eq!(config.max_conflict_retries, 3);
        assert_eq!(config.stale_claim_secs, 300);
        assert_eq!(config.renewal_interval(), Duration::from_secs(3600));
        assert_eq!(config.renewal_batch_size, 100);
        assert_eq!(config.ledger_retention_days, 30);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn conflict_retries_are_capped() {
        let config = BillingConfig {
            max_conflict_retries: 11,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::TooManyConflictRetries { max: 10, actual: 11 })
        );
    }

    #[test]
    fn zero_retries_is_allowed() {
        let config = BillingConfig {
            max_conflict_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn batch_size_must_be_in_range() {
        for size in [0, 1001] {
            let config = BillingConfig {
                renewal_batch_size: size,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ValidationError::InvalidBatchSize { .. })
            ));
        }
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = BillingConfig {
            renewal_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::ZeroInterval("renewal_interval_secs"))
        );
    }
}
