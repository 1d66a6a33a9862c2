//! Per-client ceremony state
//!
//! The session holds at most one pending challenge together with the username
//! and user handle it was issued for. Issuing a new challenge overwrites all
//! three.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

const CHALLENGE_KEY: &str = "challenge";
const USERNAME_KEY: &str = "username";
const USER_HANDLE_KEY: &str = "userHandle";
const LOGGED_IN_KEY: &str = "loggedIn";

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SessionError(pub(crate) String);

impl From<tower_sessions::session::Error> for SessionError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self(err.to_string())
    }
}

/// A challenge waiting for its credential response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChallenge {
    /// base64url challenge as sent to the client
    pub challenge: String,
    pub issued_at: DateTime<Utc>,
}

impl PendingChallenge {
    pub fn new(challenge: String) -> Self {
        Self {
            challenge,
            issued_at: Utc::now(),
        }
    }

    /// `None` means no lifetime beyond the session's own.
    pub fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        match ttl {
            Some(ttl) => now - self.issued_at > ttl,
            None => false,
        }
    }
}

#[async_trait]
pub trait CeremonySession: Send + Sync {
    /// Bind a fresh challenge to the username and user handle it was issued for.
    async fn bind(
        &self,
        pending: PendingChallenge,
        username: &str,
        user_handle: &str,
    ) -> Result<(), SessionError>;

    /// Remove and return the pending challenge.
    async fn take_challenge(&self) -> Result<Option<PendingChallenge>, SessionError>;

    async fn username(&self) -> Result<Option<String>, SessionError>;

    async fn user_handle(&self) -> Result<Option<String>, SessionError>;

    async fn set_logged_in(&self) -> Result<(), SessionError>;

    async fn logged_in(&self) -> Result<bool, SessionError>;
}

/// Cookie-backed session from the tower-sessions layer
#[derive(Debug, Clone)]
pub struct TowerCeremonySession(pub Session);

#[async_trait]
impl CeremonySession for TowerCeremonySession {
    async fn bind(
        &self,
        pending: PendingChallenge,
        username: &str,
        user_handle: &str,
    ) -> Result<(), SessionError> {
        self.0.insert(CHALLENGE_KEY, &pending).await?;
        self.0.insert(USERNAME_KEY, username).await?;
        self.0.insert(USER_HANDLE_KEY, user_handle).await?;
        Ok(())
    }

    async fn take_challenge(&self) -> Result<Option<PendingChallenge>, SessionError> {
        Ok(self.0.remove::<PendingChallenge>(CHALLENGE_KEY).await?)
    }

    async fn username(&self) -> Result<Option<String>, SessionError> {
        Ok(self.0.get::<String>(USERNAME_KEY).await?)
    }

    async fn user_handle(&self) -> Result<Option<String>, SessionError> {
        Ok(self.0.get::<String>(USER_HANDLE_KEY).await?)
    }

    async fn set_logged_in(&self) -> Result<(), SessionError> {
        self.0.insert(LOGGED_IN_KEY, true).await?;
        Ok(())
    }

    async fn logged_in(&self) -> Result<bool, SessionError> {
        Ok(self.0.get::<bool>(LOGGED_IN_KEY).await?.unwrap_or(false))
    }
}

#[cfg(test)]
pub(crate) use memory::InMemorySession;
