//! WebAuthn HTTP endpoint handlers
//!
//! Both endpoints read the raw body so that missing and malformed input is
//! reported with the ceremony's own messages rather than the extractor's.

use axum::{body::Bytes, extract::State, Json};
use keyreg_core::{parse_body, RegisterRequest};
use tower_sessions::Session;

use super::session::TowerCeremonySession;
use super::types::{CeremonyParams, CredentialBody, ErrorResponse, MessageResponse, RegisterBody};
use crate::error::ApiError;
use crate::state::AppState;

pub const REGISTERED_MESSAGE: &str = "registered credential successfully";

/// POST /webauthn/register
///
/// Start a registration ceremony for a new username.
/// Returns the options for `navigator.credentials.create`.
#[utoipa::path(
    post,
    path = "/webauthn/register",
    tag = "WebAuthn",
    request_body = RegisterBody,
    responses(
        (status = 200, description = "Ceremony started", body = CeremonyParams),
        (status = 400, description = "Missing field or username already taken", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Json<CeremonyParams>, ApiError> {
    let request: RegisterRequest =
        parse_body(&body).map_err(|e| ApiError::validation(e.to_string()))?;

    let params = state
        .issuer
        .start(&TowerCeremonySession(session), request)
        .await?;
    Ok(Json(params))
}

/// POST /webauthn/response
///
/// Complete the pending ceremony with the authenticator's credential.
#[utoipa::path(
    post,
    path = "/webauthn/response",
    tag = "WebAuthn",
    request_body = CredentialBody,
    responses(
        (status = 200, description = "Credential registered", body = MessageResponse),
        (status = 400, description = "Invalid field, challenge or origin mismatch, or unsupported response", body = ErrorResponse),
        (status = 401, description = "Attestation signature verification failed", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn response(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .coordinator
        .complete(&TowerCeremonySession(session), &body)
        .await?;
    Ok(Json(MessageResponse::new(REGISTERED_MESSAGE)))
}
