//! Fintrack - Subscription billing core
//!
//! Applies payment provider events to subscriptions exactly once and renews
//! lapsed subscriptions.
//!
//! - `domain` - Money, payments and the subscription state machine
//! - `ports` - Storage, ledger and provider translation interfaces
//! - `application` - Event processing and the renewal sweep
//! - `adapters` - In-memory, PostgreSQL and Stripe implementations
//! - `config` - Environment-based configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
