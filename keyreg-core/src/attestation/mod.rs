//! Attestation objects and their verification.
//!
//! The attestation statement shape depends on `fmt`. The supported formats are
//! a closed set; each variant has its own parser and signature check and they
//! all sit behind the [`AttestationVerifier`] trait.

mod certificate;
mod fido_u2f;
mod packed;

use std::fmt;

use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::authenticator_data::{AuthenticatorData, Flags};
use crate::cose::CredentialPublicKey;
use crate::encoding;
use crate::error::AttestationError;
use crate::validator::ValidatedResponse;

pub use fido_u2f::FidoU2fStatement;
pub use packed::PackedStatement;

/// Attestation statement formats understood by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttestationFormat {
    #[serde(rename = "packed")]
    Packed,
    #[serde(rename = "fido-u2f")]
    FidoU2f,
    #[serde(rename = "none")]
    None,
}

impl AttestationFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttestationFormat::Packed => "packed",
            AttestationFormat::FidoU2f => "fido-u2f",
            AttestationFormat::None => "none",
        }
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AttestationFormat {
    type Error = AttestationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "packed" => Ok(AttestationFormat::Packed),
            "fido-u2f" => Ok(AttestationFormat::FidoU2f),
            "none" => Ok(AttestationFormat::None),
            other => Err(AttestationError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// A decoded `attStmt`, one variant per format.
#[derive(Debug, Clone, PartialEq)]
pub enum AttestationStatement {
    None,
    Packed(PackedStatement),
    FidoU2f(FidoU2fStatement),
}

impl AttestationStatement {
    fn parse(format: AttestationFormat, value: &Value) -> Result<Self, AttestationError> {
        let map = value.as_map().ok_or_else(|| {
            AttestationError::MalformedStatement("attStmt is not a map".to_string())
        })?;

        match format {
            AttestationFormat::None => {
                if !map.is_empty() {
                    return Err(AttestationError::MalformedStatement(
                        "attStmt must be empty for fmt \"none\"".to_string(),
                    ));
                }
                Ok(AttestationStatement::None)
            }
            AttestationFormat::Packed => Ok(AttestationStatement::Packed(
                PackedStatement::from_map(map)?,
            )),
            AttestationFormat::FidoU2f => Ok(AttestationStatement::FidoU2f(
                FidoU2fStatement::from_map(map)?,
            )),
        }
    }
}

/// The CBOR attestation object sent as `response.attestationObject`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    pub format: AttestationFormat,
    pub statement: AttestationStatement,
    pub auth_data: AuthenticatorData,
    /// authData exactly as signed.
    pub raw_auth_data: Vec<u8>,
}

pub(crate) fn map_get<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v)
}

impl AttestationObject {
    pub fn from_base64url(encoded: &str) -> Result<Self, AttestationError> {
        let bytes = encoding::decode(encoded).map_err(|_| AttestationError::Encoding)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AttestationError> {
        let value: Value = ciborium::de::from_reader(bytes)
            .map_err(|e| AttestationError::MalformedObject(e.to_string()))?;
        let map = value
            .as_map()
            .ok_or_else(|| AttestationError::MalformedObject("not a CBOR map".to_string()))?;

        let fmt = map_get(map, "fmt")
            .and_then(Value::as_text)
            .ok_or_else(|| AttestationError::MalformedObject("missing fmt".to_string()))?;
        let format = AttestationFormat::try_from(fmt)?;

        let raw_auth_data = map_get(map, "authData")
            .and_then(Value::as_bytes)
            .ok_or_else(|| AttestationError::MalformedObject("missing authData".to_string()))?
            .clone();
        let auth_data = AuthenticatorData::from_slice(&raw_auth_data)?;

        let statement = map_get(map, "attStmt")
            .ok_or_else(|| AttestationError::MalformedObject("missing attStmt".to_string()))?;
        let statement = AttestationStatement::parse(format, statement)?;

        Ok(Self {
            format,
            statement,
            auth_data,
            raw_auth_data,
        })
    }
}

/// Why a structurally sound attestation was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    BadSignature,
    RpIdHashMismatch,
    UserNotPresent,
    AlgorithmMismatch,
    NoneAttestationNotAllowed,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::BadSignature => "signature does not verify",
            Rejection::RpIdHashMismatch => "rpIdHash does not match the relying party",
            Rejection::UserNotPresent => "user presence flag not set",
            Rejection::AlgorithmMismatch => "statement alg differs from credential alg",
            Rejection::NoneAttestationNotAllowed => "\"none\" attestation is not accepted",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The credential material extracted from a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatorInfo {
    pub credential_id: Vec<u8>,
    /// COSE_Key bytes as sent by the authenticator.
    pub public_key: Vec<u8>,
    pub algorithm: i64,
    pub sign_count: u32,
    pub aaguid: [u8; 16],
    pub format: AttestationFormat,
}

/// Outcome of an attestation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationResult {
    pub verified: bool,
    pub authenticator_info: AuthenticatorInfo,
    pub rejection: Option<Rejection>,
}

impl AttestationResult {
    fn accepted(authenticator_info: AuthenticatorInfo) -> Self {
        Self {
            verified: true,
            authenticator_info,
            rejection: None,
        }
    }

    fn rejected(authenticator_info: AuthenticatorInfo, reason: Rejection) -> Self {
        Self {
            verified: false,
            authenticator_info,
            rejection: Some(reason),
        }
    }
}

/// Verifies the attestation carried by a validated registration response.
///
/// A cryptographically invalid attestation is `Ok` with `verified == false`;
/// `Err` is reserved for input that cannot be interpreted at all.
pub trait AttestationVerifier: Send + Sync {
    fn verify(&self, response: &ValidatedResponse) -> Result<AttestationResult, AttestationError>;
}

/// Verifier for `packed`, `fido-u2f` and (optionally) `none`.
///
/// No trust anchors are consulted: a certificate chain only supplies the key.
#[derive(Debug, Clone)]
pub struct StandardVerifier {
    rp_id_hash: [u8; 32],
    allow_none: bool,
}

impl StandardVerifier {
    pub fn new(rp_id: &str) -> Self {
        Self {
            rp_id_hash: Sha256::digest(rp_id.as_bytes()).into(),
            allow_none: false,
        }
    }

    /// Treat `fmt = "none"` as verified.
    pub fn allow_none_attestation(mut self, allow: bool) -> Self {
        self.allow_none = allow;
        self
    }

    fn check_statement(
        &self,
        object: &AttestationObject,
        credential_key: &CredentialPublicKey,
        credential_id: &[u8],
        client_data_hash: &[u8; 32],
    ) -> Result<Option<Rejection>, AttestationError> {
        match &object.statement {
            AttestationStatement::None => Ok((!self.allow_none)
                .then_some(Rejection::NoneAttestationNotAllowed)),
            AttestationStatement::Packed(stmt) => {
                stmt.verify(&object.raw_auth_data, client_data_hash, credential_key)
            }
            AttestationStatement::FidoU2f(stmt) => stmt.verify(
                &object.auth_data.rp_id_hash,
                client_data_hash,
                credential_id,
                credential_key,
            ),
        }
    }
}

impl AttestationVerifier for StandardVerifier {
    fn verify(&self, response: &ValidatedResponse) -> Result<AttestationResult, AttestationError> {
        let object = AttestationObject::from_bytes(&response.attestation_object)?;

        let credential = object
            .auth_data
            .attested_credential
            .as_ref()
            .ok_or(AttestationError::MissingCredentialData)?;
        if credential.credential_id != response.credential_id {
            return Err(AttestationError::CredentialIdMismatch);
        }
        let credential_key = CredentialPublicKey::from_cose(&credential.public_key)?;

        let info = AuthenticatorInfo {
            credential_id: credential.credential_id.clone(),
            public_key: credential.public_key_bytes.clone(),
            algorithm: credential_key.algorithm(),
            sign_count: object.auth_data.sign_count,
            aaguid: credential.aaguid,
            format: object.format,
        };

        if object.auth_data.rp_id_hash != self.rp_id_hash {
            return Ok(AttestationResult::rejected(info, Rejection::RpIdHashMismatch));
        }
        if !object.auth_data.flags.contains(Flags::UP) {
            return Ok(AttestationResult::rejected(info, Rejection::UserNotPresent));
        }

        let client_data_hash = response.client_data.hash();
        let rejection = self.check_statement(
            &object,
            &credential_key,
            &credential.credential_id,
            &client_data_hash,
        )?;

        debug!(fmt = %object.format, verified = rejection.is_none(), "attestation checked");

        Ok(match rejection {
            None => AttestationResult::accepted(info),
            Some(reason) => AttestationResult::rejected(info, reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SoftAuthenticator, Tamper};
    use crate::validator::ResponseValidator;
    use crate::Challenge;

    const ORIGIN: &str = "https://example.com";
    const RP_ID: &str = "example.com";

    fn validated(mode: SoftAuthenticator, tamper: Tamper) -> ValidatedResponse {
        let challenge = Challenge::generate();
        let body = mode.register_with(&challenge, ORIGIN, RP_ID, tamper);
        ResponseValidator::new(ORIGIN)
            .validate_raw(body.to_string().as_bytes(), Some(&challenge))
            .unwrap()
    }

    #[test]
    fn test_format_names() {
        for format in [
            AttestationFormat::Packed,
            AttestationFormat::FidoU2f,
            AttestationFormat::None,
        ] {
            assert_eq!(AttestationFormat::try_from(format.as_str()), Ok(format));
        }
        assert_eq!(
            AttestationFormat::try_from("tpm"),
            Err(AttestationError::UnsupportedFormat("tpm".to_string()))
        );
    }

    #[test]
    fn test_verify_packed_self_attestation() {
        let authenticator = SoftAuthenticator::packed_self();
        let response = validated(authenticator.clone(), Tamper::None);
        let result = StandardVerifier::new(RP_ID).verify(&response).unwrap();

        assert!(result.verified);
        assert_eq!(result.rejection, None);
        assert_eq!(result.authenticator_info.format, AttestationFormat::Packed);
        assert_eq!(result.authenticator_info.algorithm, crate::ES256);
        assert_eq!(result.authenticator_info.credential_id, authenticator.credential_id());
        assert_eq!(result.authenticator_info.sign_count, 0);
    }

    #[test]
    fn test_verify_packed_x5c_attestation() {
        let response = validated(SoftAuthenticator::packed_x5c(), Tamper::None);
        let result = StandardVerifier::new(RP_ID).verify(&response).unwrap();
        assert!(result.verified);
    }

    #[test]
    fn test_verify_fido_u2f_attestation() {
        let response = validated(SoftAuthenticator::fido_u2f(), Tamper::None);
        let result = StandardVerifier::new(RP_ID).verify(&response).unwrap();
        assert!(result.verified);
        assert_eq!(result.authenticator_info.format, AttestationFormat::FidoU2f);
    }

    #[test]
    fn test_bad_signature_is_not_an_error() {
        for authenticator in [
            SoftAuthenticator::packed_self(),
            SoftAuthenticator::packed_x5c(),
            SoftAuthenticator::fido_u2f(),
        ] {
            let response = validated(authenticator, Tamper::Signature);
            let result = StandardVerifier::new(RP_ID).verify(&response).unwrap();
            assert!(!result.verified);
            assert_eq!(result.rejection, Some(Rejection::BadSignature));
        }
    }

    #[test]
    fn test_undecodable_signature_is_rejected() {
        let response = validated(SoftAuthenticator::packed_self(), Tamper::GarbageSignature);
        let result = StandardVerifier::new(RP_ID).verify(&response).unwrap();
        assert_eq!(result.rejection, Some(Rejection::BadSignature));
    }

    #[test]
    fn test_none_attestation_policy() {
        let response = validated(SoftAuthenticator::none(), Tamper::None);

        let result = StandardVerifier::new(RP_ID).verify(&response).unwrap();
        assert_eq!(result.rejection, Some(Rejection::NoneAttestationNotAllowed));

        let result = StandardVerifier::new(RP_ID)
            .allow_none_attestation(true)
            .verify(&response)
            .unwrap();
        assert!(result.verified);
    }

    #[test]
    fn test_rp_id_hash_mismatch() {
        let response = validated(SoftAuthenticator::packed_self(), Tamper::None);
        let result = StandardVerifier::new("evil.example")
            .verify(&response)
            .unwrap();
        assert_eq!(result.rejection, Some(Rejection::RpIdHashMismatch));
    }

    #[test]
    fn test_user_presence_required() {
        let response = validated(SoftAuthenticator::packed_self(), Tamper::ClearUserPresent);
        let result = StandardVerifier::new(RP_ID).verify(&response).unwrap();
        assert_eq!(result.rejection, Some(Rejection::UserNotPresent));
    }

    #[test]
    fn test_packed_alg_mismatch() {
        let response = validated(SoftAuthenticator::packed_self(), Tamper::StatementAlg(-257));
        let result = StandardVerifier::new(RP_ID).verify(&response).unwrap();
        assert_eq!(result.rejection, Some(Rejection::AlgorithmMismatch));
    }

    #[test]
    fn test_unsupported_format_is_structural() {
        let response = validated(SoftAuthenticator::packed_self(), Tamper::Format("tpm"));
        assert_eq!(
            StandardVerifier::new(RP_ID).verify(&response),
            Err(AttestationError::UnsupportedFormat("tpm".to_string()))
        );
    }

    #[test]
    fn test_garbage_object_is_structural() {
        assert!(matches!(
            AttestationObject::from_bytes(&[0xff, 0x00]),
            Err(AttestationError::MalformedObject(_))
        ));
        assert_eq!(
            AttestationObject::from_base64url("%%%"),
            Err(AttestationError::Encoding)
        );
    }
}
