//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::webauthn::storage::{self, MemoryCredentialStore};
use crate::webauthn::{
    ChallengeIssuer, CredentialStore, RegistrationCoordinator, RelyingParty, StorageError,
};

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<ChallengeIssuer>,
    pub coordinator: Arc<RegistrationCoordinator>,
    pub store: Arc<dyn CredentialStore>,
}

impl AppState {
    pub fn new(config: &Config, rp: RelyingParty, store: Arc<dyn CredentialStore>) -> Self {
        let coordinator = RegistrationCoordinator::for_relying_party(&rp, Arc::clone(&store))
            .with_challenge_ttl(config.challenge_ttl());
        let issuer = ChallengeIssuer::new(Arc::clone(&store), rp);

        Self {
            issuer: Arc::new(issuer),
            coordinator: Arc::new(coordinator),
            store,
        }
    }

    /// State backed by in-memory storage (for testing)
    pub fn in_memory(config: &Config, rp: RelyingParty) -> Self {
        Self::new(config, rp, Arc::new(MemoryCredentialStore::new()))
    }

    /// State with the storage backend selected by `config`
    pub async fn from_config(config: &Config, rp: RelyingParty) -> Result<Self, StorageError> {
        let store = storage::from_config(config).await?;
        Ok(Self::new(config, rp, store))
    }
}
