//! WebAuthn registration ceremony
//!
//! ## Architecture
//!
//! - `config`: Relying Party identity
//! - `issuer`: registration start (username reservation, challenge issue)
//! - `coordinator`: registration completion state machine
//! - `session`: per-client ceremony state
//! - `storage`: user records (PostgreSQL or memory)
//! - `handlers`: HTTP endpoints
//! - `types`: wire types for the API

mod config;
mod coordinator;
pub mod handlers;
mod issuer;
pub mod session;
pub mod storage;
mod types;

pub use config::{ConfigError, RelyingParty};
pub use coordinator::RegistrationCoordinator;
pub use handlers::{register, response, REGISTERED_MESSAGE};
pub use issuer::ChallengeIssuer;
pub use session::{CeremonySession, PendingChallenge, SessionError, TowerCeremonySession};
pub use storage::{CredentialStore, StorageError};
pub use types::{
    AttestationResponseBody, CeremonyParams, CeremonyState, CredentialBody, ErrorResponse,
    MessageResponse, PubKeyCredParam, RegisterBody, RpEntity, UserEntity,
};
