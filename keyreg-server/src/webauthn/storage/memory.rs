//! In-memory credential storage
//!
//! Every record carries a version. A transaction remembers the version it read
//! and its commit fails with [`StorageError::Conflict`] if another writer got
//! there first.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use keyreg_core::User;

use super::{CredentialStore, Reservation, StorageError, UserTransaction};

#[derive(Debug, Clone)]
struct Versioned {
    user: User,
    version: u64,
}

/// DashMap-backed store; contents are lost on restart.
#[derive(Default, Clone)]
pub struct MemoryCredentialStore {
    users: Arc<DashMap<String, Versioned>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        tracing::warn!("Using in-memory credential storage - users will be lost on restart!");
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn reserve_pending(
        &self,
        username: &str,
        pending: User,
    ) -> Result<Reservation, StorageError> {
        // The entry guard holds the shard lock across the check and the write.
        match self.users.entry(username.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().user.registered {
                    return Ok(Reservation::AlreadyRegistered);
                }
                let version = entry.get().version + 1;
                entry.insert(Versioned {
                    user: pending.clone(),
                    version,
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(Versioned {
                    user: pending.clone(),
                    version: 1,
                });
            }
        }
        Ok(Reservation::Reserved(pending))
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>, StorageError> {
        Ok(self.users.get(username).map(|entry| entry.user.clone()))
    }

    async fn begin(&self) -> Result<Box<dyn UserTransaction>, StorageError> {
        Ok(Box::new(MemoryTransaction {
            users: Arc::clone(&self.users),
            read_versions: HashMap::new(),
            writes: HashMap::new(),
        }))
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCredentialStore")
            .field("users", &self.users.len())
            .finish()
    }
}

struct MemoryTransaction {
    users: Arc<DashMap<String, Versioned>>,
    /// Version observed by `get`; `None` when the record did not exist.
    read_versions: HashMap<String, Option<u64>>,
    writes: HashMap<String, User>,
}

#[async_trait]
impl UserTransaction for MemoryTransaction {
    async fn get(&mut self, username: &str) -> Result<Option<User>, StorageError> {
        if let Some(user) = self.writes.get(username) {
            return Ok(Some(user.clone()));
        }
        let current = self
            .users
            .get(username)
            .map(|entry| (entry.user.clone(), entry.version));
        self.read_versions
            .entry(username.to_string())
            .or_insert(current.as_ref().map(|(_, version)| *version));
        Ok(current.map(|(user, _)| user))
    }

    async fn save(&mut self, username: &str, user: User) -> Result<(), StorageError> {
        self.writes.insert(username.to_string(), user);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let MemoryTransaction {
            users,
            read_versions,
            writes,
        } = *self;

        for (username, user) in writes {
            // Blind writes (no prior get) skip the version check.
            let expected = read_versions.get(&username).copied();
            match users.entry(username.clone()) {
                Entry::Occupied(mut entry) => {
                    if let Some(expected) = expected {
                        if expected != Some(entry.get().version) {
                            return Err(StorageError::Conflict(username));
                        }
                    }
                    let version = entry.get().version + 1;
                    entry.insert(Versioned { user, version });
                }
                Entry::Vacant(entry) => {
                    if let Some(Some(_)) = expected {
                        return Err(StorageError::Conflict(username));
                    }
                    entry.insert(Versioned { user, version: 1 });
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}
