//! Persisted record types for the expense tracker.
//!
//! Records are stored as JSON with camelCase keys. Loosely typed expense
//! input is modelled in [`expense::ExpenseInput`] and canonicalised by
//! [`expense::normalize_expense`] before [`expense::validate_expense`] runs.

pub mod errors;
pub mod expense;
pub mod id;
pub mod meta;
pub mod session;
pub mod user;
