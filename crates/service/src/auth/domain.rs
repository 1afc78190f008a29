use chrono::{DateTime, Utc};
use models::user::UserRecord;
use serde::{Deserialize, Serialize};

/// Registration input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Domain user (public view, no password)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for AuthUser {
    fn from(u: &UserRecord) -> Self {
        AuthUser { id: u.id.clone(), name: u.name.clone(), email: u.email.clone(), created_at: u.created_at }
    }
}
