//! Credential storage
//!
//! The ceremony only ever touches one kind of entity: a [`User`] keyed by
//! username. Storage is reached through the [`CredentialStore`] capability so
//! the issuer and coordinator never know which backend they talk to.
//!
//! - `memory`: DashMap with per-record versions (development and tests)
//! - `postgres`: `users` table via sqlx
//!
//! If `DATABASE_URL` is not set, [`from_config`] falls back to memory.

mod memory;
mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PostgresCredentialStore;

use std::sync::Arc;

use async_trait::async_trait;
use keyreg_core::User;

use crate::config::Config;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Concurrent update to user {0}")]
    Conflict(String),

    #[error("User {0} not found")]
    NotFound(String),
}

/// Outcome of the atomic check-and-reserve performed at ceremony start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// The pending record now stored for the username.
    Reserved(User),
    /// A completed registration already owns the username; nothing was written.
    AlreadyRegistered,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store `pending` under `username` unless a registered user holds it.
    ///
    /// An unregistered record left by an abandoned attempt is overwritten.
    async fn reserve_pending(
        &self,
        username: &str,
        pending: User,
    ) -> Result<Reservation, StorageError>;

    async fn get_user(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// Open a read-modify-write transaction.
    async fn begin(&self) -> Result<Box<dyn UserTransaction>, StorageError>;

    async fn check_health(&self) -> Result<(), StorageError>;

    /// Backend name reported by `/health`.
    fn backend(&self) -> &'static str;
}

/// A transaction over user records.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait UserTransaction: Send {
    async fn get(&mut self, username: &str) -> Result<Option<User>, StorageError>;

    async fn save(&mut self, username: &str, user: User) -> Result<(), StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

/// Build the store selected by the configuration.
///
/// Uses PostgreSQL if `DATABASE_URL` is set, otherwise falls back to in-memory.
pub async fn from_config(config: &Config) -> Result<Arc<dyn CredentialStore>, StorageError> {
    match config.database_url.as_deref() {
        Some(url) if !url.is_empty() => {
            tracing::info!("Using PostgreSQL credential storage");
            let store =
                PostgresCredentialStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        _ => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage");
            Ok(Arc::new(MemoryCredentialStore::new()))
        }
    }
}
