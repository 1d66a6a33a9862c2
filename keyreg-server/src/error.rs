//! API error handling module
//!
//! One error type for both ceremony endpoints. Binding and validation failures
//! carry a specific message; verification and storage failures are reported
//! generically and logged with their internal details.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keyreg_core::CeremonyError;
use thiserror::Error;

use crate::webauthn::session::SessionError;
use crate::webauthn::storage::StorageError;

const FATAL_MESSAGE: &str = "Fatal error during registration.";

/// API error type with one variant per ceremony failure class
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input, including structurally broken attestations
    #[error("{0}")]
    Validation(String),

    /// Username already owned by a completed registration
    #[error("Username {0} already registered")]
    Conflict(String),

    /// Client data challenge differs from the pending one, or none is pending
    #[error("Challenge mismatch")]
    ChallengeMismatch,

    /// Pending challenge outlived its configured lifetime
    #[error("Challenge expired")]
    ChallengeExpired,

    #[error("Origin mismatch: expected {expected}, got {actual}")]
    OriginMismatch { expected: String, actual: String },

    #[error("Unsupported response type: {0}")]
    UnsupportedResponseType(String),

    /// Attestation parsed but did not verify
    #[error("Attestation verification failed: {0}")]
    SignatureVerification(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn signature_verification(reason: impl Into<String>) -> Self {
        Self::SignatureVerification(reason.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::Conflict(_)
            | Self::ChallengeMismatch
            | Self::ChallengeExpired
            | Self::OriginMismatch { .. }
            | Self::UnsupportedResponseType(_) => StatusCode::BAD_REQUEST,
            Self::SignatureVerification(_) => StatusCode::UNAUTHORIZED,
            Self::Storage(_) | Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_INPUT",
            Self::Conflict(_) => "USERNAME_TAKEN",
            Self::ChallengeMismatch => "CHALLENGE_MISMATCH",
            Self::ChallengeExpired => "CHALLENGE_EXPIRED",
            Self::OriginMismatch { .. } => "ORIGIN_MISMATCH",
            Self::UnsupportedResponseType(_) => "UNSUPPORTED_RESPONSE",
            Self::SignatureVerification(_) => "VERIFICATION_FAILED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Session(_) => "SESSION_ERROR",
        }
    }

    /// Get sanitized error message for client response
    pub fn client_message(&self) -> String {
        match self {
            Self::Conflict(_) => "Username already taken".to_string(),
            Self::SignatureVerification(_) => "Attestation signature verification failed".to_string(),
            Self::Storage(_) | Self::Session(_) => FATAL_MESSAGE.to_string(),
            _ => self.to_string(),
        }
    }

    fn error_category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::ChallengeMismatch | Self::ChallengeExpired | Self::OriginMismatch { .. } => {
                "binding"
            }
            Self::UnsupportedResponseType(_) => "validation",
            Self::SignatureVerification(_) => "verification",
            Self::Storage(_) => "storage",
            Self::Session(_) => "session",
        }
    }
}

impl From<CeremonyError> for ApiError {
    fn from(err: CeremonyError) -> Self {
        match err {
            CeremonyError::Validation(e) => Self::Validation(e.to_string()),
            CeremonyError::ChallengeMismatch => Self::ChallengeMismatch,
            CeremonyError::OriginMismatch { expected, actual } => {
                Self::OriginMismatch { expected, actual }
            }
            CeremonyError::UnsupportedResponseType(detail) => Self::UnsupportedResponseType(detail),
            CeremonyError::Attestation(e) => Self::Validation(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        match &self {
            Self::Validation(_)
            | Self::Conflict(_)
            | Self::ChallengeMismatch
            | Self::ChallengeExpired
            | Self::OriginMismatch { .. }
            | Self::UnsupportedResponseType(_) => {
                tracing::info!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Ceremony rejected"
                );
            }
            Self::SignatureVerification(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Attestation verification failed"
                );
            }
            Self::Storage(_) | Self::Session(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Server error"
                );
            }
        }

        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
