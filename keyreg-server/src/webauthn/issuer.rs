//! Registration start: reserve the username and issue a challenge

use std::sync::Arc;

use keyreg_core::{Challenge, RegisterRequest, User, ES256, PUBLIC_KEY_TYPE};

use super::config::RelyingParty;
use super::session::{CeremonySession, PendingChallenge};
use super::storage::{CredentialStore, Reservation};
use super::types::{CeremonyParams, CeremonyState, PubKeyCredParam, RpEntity, UserEntity};
use crate::error::ApiError;

pub struct ChallengeIssuer {
    store: Arc<dyn CredentialStore>,
    rp: RelyingParty,
}

impl ChallengeIssuer {
    pub fn new(store: Arc<dyn CredentialStore>, rp: RelyingParty) -> Self {
        Self { store, rp }
    }

    /// Reserve `request.username` and bind a fresh challenge to the session.
    ///
    /// A username held by a completed registration is refused without writing.
    /// A pending record from an abandoned attempt is replaced.
    pub async fn start(
        &self,
        session: &dyn CeremonySession,
        request: RegisterRequest,
    ) -> Result<CeremonyParams, ApiError> {
        let (username, name) = request.into_parts().map_err(|e| ApiError::validation(e.to_string()))?;

        let user = match self
            .store
            .reserve_pending(&username, User::pending(name))
            .await?
        {
            Reservation::Reserved(user) => user,
            Reservation::AlreadyRegistered => return Err(ApiError::Conflict(username)),
        };

        let challenge = Challenge::generate().to_base64url();
        session
            .bind(PendingChallenge::new(challenge.clone()), &username, &user.id)
            .await?;

        tracing::info!(
            username = %username,
            state = %CeremonyState::Started,
            "Registration ceremony started"
        );

        Ok(CeremonyParams {
            challenge,
            rp: RpEntity {
                name: self.rp.name.clone(),
            },
            user: UserEntity {
                id: user.id,
                name: username,
                display_name: user.name,
            },
            attestation: "direct".to_string(),
            pub_key_cred_params: vec![PubKeyCredParam {
                type_: PUBLIC_KEY_TYPE.to_string(),
                alg: ES256,
            }],
        })
    }
}
