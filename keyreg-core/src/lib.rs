//! keyreg Core - WebAuthn registration ceremony primitives
//!
//! This crate holds everything in the registration ceremony that does not
//! depend on HTTP, sessions or a database:
//!
//! - Challenge and user-handle generation
//! - Parsing of the client data, authenticator data and COSE keys
//! - Attestation statement verification (`packed`, `fido-u2f`, `none`)
//! - The response validator binding a client response to a pending challenge
//! - The persisted `User` / `Authenticator` model
//!
//! # Example
//!
//! ```no_run
//! use keyreg_core::{AttestationVerifier, Challenge, ResponseValidator, StandardVerifier};
//!
//! # fn example(body: &[u8], challenge: Challenge) -> keyreg_core::Result<()> {
//! let validator = ResponseValidator::new("https://example.com");
//! let validated = validator.validate_raw(body, Some(&challenge))?;
//!
//! let verifier = StandardVerifier::new("example.com");
//! let result = verifier.verify(&validated)?;
//! assert!(result.verified);
//! # Ok(())
//! # }
//! ```

pub mod attestation;
pub mod authenticator_data;
pub mod challenge;
pub mod client_data;
pub mod cose;
pub mod encoding;
pub mod error;
pub mod model;
pub mod validator;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use attestation::{
    AttestationFormat, AttestationObject, AttestationResult, AttestationStatement,
    AttestationVerifier, AuthenticatorInfo, Rejection, StandardVerifier,
};
pub use authenticator_data::{AttestedCredential, AuthenticatorData, Flags};
pub use challenge::{generate_user_handle, Challenge, CHALLENGE_LEN};
pub use client_data::{ClientData, CollectedClientData};
pub use cose::{CredentialPublicKey, ES256};
pub use error::{AttestationError, CeremonyError, Result, ValidationError};
pub use model::{Authenticator, User};
pub use validator::{
    parse_body, RegisterRequest, RegistrationResponse, ResponseValidator, ValidatedResponse,
    PUBLIC_KEY_TYPE,
};
