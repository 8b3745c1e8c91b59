use service_core::error::AppError;
use thiserror::Error;

use crate::models::RecipientRecord;
use crate::services::ProviderError;

/// Why a relay request did not end in a sent notification.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("User not found")]
    RecipientNotFound { recipient_id: String },

    #[error("FCM token not found")]
    TokenNotFound {
        recipient_id: String,
        record: RecipientRecord,
    },

    #[error("Failed to read request body: {0}")]
    Body(#[from] axum::Error),

    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Lookup(#[from] AppError),

    #[error(transparent)]
    Send(#[from] ProviderError),
}

impl RelayError {
    pub fn outcome(&self) -> &'static str {
        match self {
            RelayError::RecipientNotFound { .. } => "user_not_found",
            RelayError::TokenNotFound { .. } => "token_not_found",
            _ => "error",
        }
    }
}
