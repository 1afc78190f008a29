use thiserror::Error;

use crate::auth::errors::AuthError;

/// Errors surfaced to the presentation layer.
#[derive(Debug, Error, PartialEq)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("account already exists")]
    Conflict,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self { Self::NotFound(format!("{} not found", entity)) }

    pub fn no_session() -> Self { Self::Unauthorized("no active session".into()) }

    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 2001,
            ServiceError::Conflict => 2002,
            ServiceError::NotFound(_) => 2003,
            ServiceError::Unauthorized(_) => 2004,
        }
    }
}

impl From<models::errors::ModelError> for ServiceError {
    fn from(e: models::errors::ModelError) -> Self {
        match e {
            models::errors::ModelError::Validation(msg) => ServiceError::Validation(msg),
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(msg) => ServiceError::Validation(msg),
            AuthError::Conflict => ServiceError::Conflict,
            AuthError::Unauthorized => ServiceError::Unauthorized(AuthError::Unauthorized.to_string()),
            AuthError::Repository(msg) => ServiceError::Unauthorized(format!("session unavailable: {msg}")),
        }
    }
}
