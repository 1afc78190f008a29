//! Expense CRUD scoped to the active session, plus aggregate summaries.

pub mod service;
pub mod summary;

pub use service::ExpenseService;
pub use summary::{summarize, ExpenseSummary};
