//! Error taxonomy for the registry core and its HTTP mapping.
//!
//! Every service and store operation returns `RegistryResult<T>`. The HTTP
//! layer turns a `RegistryError` into the `{success: false, message}`
//! envelope with the matching status code. Storage and internal failures are
//! logged where they happen and reach the caller only as a generic message.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Missing or malformed input. Always fixable by the caller.
    #[error("{message}")]
    Validation { message: String },

    #[error("email '{0}' is already registered")]
    DuplicateEmail(String),

    #[error("health identifier '{0}' is already in use")]
    DuplicateIdentifier(String),

    #[error("card number '{0}' has already been issued")]
    DuplicateCard(String),

    #[error("medical image '{0}' already exists")]
    DuplicateImage(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// The requested transition is not allowed from the entity's current state.
    #[error("{reason}")]
    InvalidState { reason: String },

    /// Repeated identifier collisions. Points at a systemic fault, not user error.
    #[error("could not issue a unique {kind} after {attempts} attempts")]
    GenerationExhausted { kind: &'static str, attempts: u32 },

    #[error("storage failure while {context}: {reason}")]
    Storage { context: String, reason: String },

    #[error("internal failure: {reason}")]
    Internal { reason: String },
}

/// Convenience alias used throughout the crate.
pub type RegistryResult<T> = Result<T, RegistryError>;

impl RegistryError {
    pub fn validation(message: impl Into<String>) -> Self {
        RegistryError::Validation { message: message.into() }
    }

    pub fn missing_fields(fields: &[&str]) -> Self {
        RegistryError::Validation {
            message: format!("missing required fields: {}", fields.join(", ")),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        RegistryError::NotFound { entity, id: id.into() }
    }

    pub fn storage(context: impl Into<String>, reason: impl ToString) -> Self {
        RegistryError::Storage {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Message safe to hand to a client.
    pub fn public_message(&self) -> String {
        match self {
            RegistryError::Storage { .. } => "Database error occurred.".to_string(),
            RegistryError::Internal { .. } => "Internal server error.".to_string(),
            RegistryError::GenerationExhausted { kind, .. } => {
                format!("Failed to generate a unique {kind}. Please try again later.")
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for RegistryError {
    fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::Validation { .. } => StatusCode::BAD_REQUEST,
            RegistryError::NotFound { .. } => StatusCode::NOT_FOUND,
            RegistryError::DuplicateEmail(_)
            | RegistryError::DuplicateIdentifier(_)
            | RegistryError::DuplicateCard(_)
            | RegistryError::DuplicateImage(_)
            | RegistryError::InvalidState { .. } => StatusCode::CONFLICT,
            RegistryError::GenerationExhausted { .. }
            | RegistryError::Storage { .. }
            | RegistryError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.public_message(),
        }))
    }
}
