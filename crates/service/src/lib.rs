//! Service layer of the expense tracker.
//! - `storage`: failure-tolerant key/value access and JSON collections.
//! - `auth`: user registry and the single active session.
//! - `expense`: validated, normalized CRUD scoped to the session's user.
//! - `helpers`: the normalization/validation used before every write.

pub mod auth;
pub mod errors;
pub mod expense;
pub mod helpers;
pub mod runtime;
pub mod session;
pub mod storage;
