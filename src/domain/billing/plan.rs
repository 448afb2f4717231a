//! Subscription plan types and payment methods.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Billing plan of a subscription. Determines the billing period length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    Monthly,
    Quarterly,
    Annual,
}

impl SubscriptionType {
    pub fn period_months(&self) -> u32 {
        match self {
            SubscriptionType::Monthly => 1,
            SubscriptionType::Quarterly => 3,
            SubscriptionType::Annual => 12,
        }
    }

    /// First day after the billing period that starts on `start`.
    ///
    /// Month-end anchors clamp (Jan 31 + 1 month = Feb 28/29).
    /// Saturates at `NaiveDate::MAX` for dates near the end of the calendar.
    pub fn period_end(&self, start: NaiveDate) -> NaiveDate {
        start
            .checked_add_months(Months::new(self.period_months()))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionType::Monthly => "monthly",
            SubscriptionType::Quarterly => "quarterly",
            SubscriptionType::Annual => "annual",
        }
    }
}

impl FromStr for SubscriptionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(SubscriptionType::Monthly),
            "quarterly" => Ok(SubscriptionType::Quarterly),
            "annual" => Ok(SubscriptionType::Annual),
            other => Err(ValidationError::invalid_format(
                "subscription_type",
                format!("unknown plan '{}'", other),
            )),
        }
    }
}

/// How the subscriber pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Wallet => "wallet",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "wallet" => Ok(PaymentMethod::Wallet),
            other => Err(ValidationError::invalid_format(
                "payment_method",
                format!("unknown payment method '{}'", other),
            )),
        }
    }
}
