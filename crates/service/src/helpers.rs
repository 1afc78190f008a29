//! Normalization, validation and id generation for client-side pre-validation.
//!
//! These are the same functions the services run before every write.

use models::expense::ExpenseInput;

use crate::errors::ServiceError;

pub use models::expense::normalize_expense;
pub use models::id::generate_id;

/// Strict shape check of an already normalized expense.
pub fn validate_expense(input: &ExpenseInput) -> Result<(), ServiceError> {
    Ok(models::expense::validate_expense(input)?)
}

/// Normalize then validate, returning the normalized form.
pub fn check_expense(input: ExpenseInput) -> Result<ExpenseInput, ServiceError> {
    let normalized = normalize_expense(input);
    validate_expense(&normalized)?;
    Ok(normalized)
}
