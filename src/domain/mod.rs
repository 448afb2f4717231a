//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, money, errors)
//! - `billing` - Subscription lifecycle, payments, totals and renewals

pub mod billing;
pub mod foundation;
