use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::id::generate_id;

/// Stored user record. The password is kept in clear text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// Lowercase and trim an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_name(name: &str) -> Result<(), ModelError> {
    if name.trim().is_empty() {
        return Err(ModelError::validation("name is required"));
    }
    Ok(())
}

impl UserRecord {
    /// Build a new record with a fresh id and a normalized email.
    pub fn create(name: &str, email: &str, password: &str) -> Result<Self, ModelError> {
        validate_name(name)?;
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ModelError::validation("email is required"));
        }
        if password.is_empty() {
            return Err(ModelError::validation("password is required"));
        }
        Ok(Self {
            id: generate_id(),
            name: name.trim().to_string(),
            email,
            password: password.to_string(),
            created_at: Utc::now(),
        })
    }
}
