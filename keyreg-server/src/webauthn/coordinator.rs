//! Registration completion state machine
//!
//! `RESPONSE_RECEIVED -> VALIDATED -> VERIFIED -> PERSISTED`, or `REJECTED`
//! from any state. The credential is appended exactly once, inside the single
//! commit that follows a successful verification.

use std::sync::Arc;

use chrono::{Duration, Utc};
use keyreg_core::{
    AttestationVerifier, Authenticator, CeremonyError, Challenge, ResponseValidator,
    StandardVerifier, User,
};

use super::config::RelyingParty;
use super::session::{CeremonySession, PendingChallenge};
use super::storage::{CredentialStore, StorageError, UserTransaction};
use super::types::CeremonyState;
use crate::error::ApiError;

pub struct RegistrationCoordinator {
    validator: ResponseValidator,
    verifier: Arc<dyn AttestationVerifier>,
    store: Arc<dyn CredentialStore>,
    challenge_ttl: Option<Duration>,
}

impl RegistrationCoordinator {
    pub fn new(
        validator: ResponseValidator,
        verifier: Arc<dyn AttestationVerifier>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            validator,
            verifier,
            store,
            challenge_ttl: None,
        }
    }

    /// Coordinator using [`StandardVerifier`] for `rp`.
    pub fn for_relying_party(rp: &RelyingParty, store: Arc<dyn CredentialStore>) -> Self {
        let verifier = StandardVerifier::new(&rp.id).allow_none_attestation(rp.allow_none_attestation);
        Self::new(
            ResponseValidator::new(rp.origin.clone()),
            Arc::new(verifier),
            store,
        )
    }

    /// Pending challenges older than `ttl` are refused. `None` leaves expiry
    /// to the session.
    pub fn with_challenge_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.challenge_ttl = ttl;
        self
    }

    /// Complete the ceremony bound to `session` with the raw response `body`.
    ///
    /// The pending challenge is consumed whatever the outcome, so every
    /// response must be preceded by its own `/register`.
    pub async fn complete(
        &self,
        session: &dyn CeremonySession,
        body: &[u8],
    ) -> Result<Authenticator, ApiError> {
        let pending = session.take_challenge().await?;
        let username = session.username().await?;
        let user_handle = session.user_handle().await?;
        tracing::debug!(state = %CeremonyState::ResponseReceived, "Credential response received");

        let bound = match (username.as_deref(), user_handle.as_deref()) {
            (Some(username), Some(user_handle)) => Some(BoundUser {
                username,
                user_handle,
            }),
            _ => None,
        };

        let result = self.run(pending, bound, body).await;
        match &result {
            Ok(authenticator) => {
                // Already committed.
                if let Err(err) = session.set_logged_in().await {
                    tracing::warn!(error = %err, "Failed to mark session logged in");
                }
                tracing::info!(
                    username = username.as_deref().unwrap_or_default(),
                    credential_id = %authenticator.credential_id,
                    fmt = %authenticator.fmt,
                    state = %CeremonyState::Persisted,
                    "Credential registered"
                );
            }
            Err(err) => {
                tracing::info!(
                    username = username.as_deref().unwrap_or_default(),
                    state = %CeremonyState::Rejected,
                    reason = err.error_code(),
                    "Registration rejected"
                );
            }
        }
        result
    }

    async fn run(
        &self,
        pending: Option<PendingChallenge>,
        bound: Option<BoundUser<'_>>,
        body: &[u8],
    ) -> Result<Authenticator, ApiError> {
        // Without a bound user there is no ceremony to complete.
        let expected = match (&pending, &bound) {
            (Some(pending), Some(_)) => Challenge::from_base64url(&pending.challenge),
            _ => None,
        };

        let validated = self.validator.validate_raw(body, expected.as_ref())?;

        if let Some(pending) = &pending {
            if pending.is_expired(self.challenge_ttl, Utc::now()) {
                return Err(ApiError::ChallengeExpired);
            }
        }
        tracing::debug!(state = %CeremonyState::Validated, "Response validated");

        let result = self
            .verifier
            .verify(&validated)
            .map_err(CeremonyError::Attestation)?;
        if !result.verified {
            let reason = result
                .rejection
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unverified".to_string());
            return Err(ApiError::signature_verification(reason));
        }
        tracing::debug!(
            fmt = %result.authenticator_info.format,
            state = %CeremonyState::Verified,
            "Attestation verified"
        );

        // `expected` is only Some when a user is bound.
        let bound = bound.ok_or(ApiError::ChallengeMismatch)?;
        let authenticator = Authenticator::from(result.authenticator_info);
        self.persist(&bound, authenticator.clone()).await?;
        Ok(authenticator)
    }

    async fn persist(&self, bound: &BoundUser<'_>, authenticator: Authenticator) -> Result<(), ApiError> {
        let mut tx = self.store.begin().await?;
        match append_authenticator(tx.as_mut(), bound, authenticator).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// The user record a session's challenge was issued for.
struct BoundUser<'a> {
    username: &'a str,
    user_handle: &'a str,
}

/// Append to the record only while it is still the pending one this ceremony
/// reserved. A record that was registered, or replaced by a later `/register`,
/// belongs to someone else.
async fn append_authenticator(
    tx: &mut dyn UserTransaction,
    bound: &BoundUser<'_>,
    authenticator: Authenticator,
) -> Result<(), ApiError> {
    let mut user: User = tx
        .get(bound.username)
        .await?
        .ok_or_else(|| StorageError::NotFound(bound.username.to_string()))?;
    if user.registered || user.id != bound.user_handle {
        tracing::warn!(
            username = bound.username,
            registered = user.registered,
            "Ceremony no longer owns the user record"
        );
        return Err(ApiError::Conflict(bound.username.to_string()));
    }
    user.complete_registration(authenticator);
    tx.save(bound.username, user).await?;
    Ok(())
}
