use serde::{Deserialize, Serialize};

/// The single active session: which user is logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSession {
    pub user_id: String,
}

impl CurrentSession {
    pub fn new(user_id: impl Into<String>) -> Self { Self { user_id: user_id.into() } }
}
