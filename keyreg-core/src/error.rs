use thiserror::Error;

/// Malformed or missing input in a ceremony request.
///
/// The display strings are returned to the client verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing request body")]
    MissingBody,

    #[error("Malformed request body")]
    MalformedBody,

    #[error("Username not provided")]
    MissingUsername,

    #[error("Name not provided")]
    MissingName,

    #[error("Missing credential id")]
    MissingId,

    #[error("Missing credential rawId")]
    MissingRawId,

    #[error("Missing credential response")]
    MissingResponse,

    #[error("Missing credential type")]
    MissingType,

    #[error("Credential type must be \"public-key\"")]
    InvalidType,

    #[error("Credential id does not match rawId")]
    IdMismatch,

    #[error("Missing clientDataJSON")]
    MissingClientData,

    #[error("Invalid clientDataJSON: {0}")]
    InvalidClientData(String),
}

/// Structural problems with an attestation object.
///
/// These are distinct from a failed signature check, which is reported
/// through [`crate::AttestationResult::verified`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttestationError {
    #[error("Invalid attestationObject encoding")]
    Encoding,

    #[error("Malformed attestation object: {0}")]
    MalformedObject(String),

    #[error("Malformed authenticator data: {0}")]
    MalformedAuthData(String),

    #[error("Authenticator data carries no attested credential")]
    MissingCredentialData,

    #[error("Attested credential id does not match rawId")]
    CredentialIdMismatch,

    #[error("Invalid credential public key: {0}")]
    InvalidPublicKey(String),

    #[error("Unsupported attestation format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(i64),

    #[error("Malformed attestation statement: {0}")]
    MalformedStatement(String),

    #[error("Invalid attestation certificate: {0}")]
    InvalidCertificate(String),
}

/// Everything that can end a registration ceremony before persistence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CeremonyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Challenge mismatch")]
    ChallengeMismatch,

    #[error("Origin mismatch: expected {expected}, got {actual}")]
    OriginMismatch { expected: String, actual: String },

    #[error("Unsupported response type: {0}")]
    UnsupportedResponseType(String),

    #[error(transparent)]
    Attestation(#[from] AttestationError),
}

pub type Result<T> = std::result::Result<T, CeremonyError>;
