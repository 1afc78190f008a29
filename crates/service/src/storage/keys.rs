//! Logical storage keys. The [`KeyValueStore`](super::KeyValueStore) adds the namespace prefix.

pub const EXPENSES: &str = "expenses-collection";
pub const EXPENSES_META: &str = "expenses-meta";
pub const USERS: &str = "users-collection";
pub const SESSION: &str = "session-singleton";
