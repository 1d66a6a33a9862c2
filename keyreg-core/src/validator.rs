//! Structural validation of ceremony requests.
//!
//! [`ResponseValidator`] checks a registration response field by field, in a
//! fixed order, and binds it to the pending challenge and the relying party
//! origin before anything is handed to an attestation verifier.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::challenge::Challenge;
use crate::client_data::ClientData;
use crate::encoding;
use crate::error::{AttestationError, CeremonyError, Result, ValidationError};

/// The only credential type WebAuthn defines.
pub const PUBLIC_KEY_TYPE: &str = "public-key";

/// Decode a JSON request body.
///
/// An empty body or a literal `null` is reported as missing; anything that is
/// not a JSON object of the expected shape is malformed.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> std::result::Result<T, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::MissingBody);
    }

    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| ValidationError::MalformedBody)?;
    match value {
        serde_json::Value::Null => Err(ValidationError::MissingBody),
        serde_json::Value::Object(_) => {
            serde_json::from_value(value).map_err(|_| ValidationError::MalformedBody)
        }
        _ => Err(ValidationError::MalformedBody),
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Body of `POST /webauthn/register`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub name: Option<String>,
}

impl RegisterRequest {
    /// Returns `(username, name)`; empty strings count as missing.
    pub fn into_parts(self) -> std::result::Result<(String, String), ValidationError> {
        let username = present(self.username).ok_or(ValidationError::MissingUsername)?;
        let name = present(self.name).ok_or(ValidationError::MissingName)?;
        Ok((username, name))
    }
}

/// `PublicKeyCredential.response` as serialized by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatorResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Option<String>,

    #[serde(rename = "attestationObject")]
    pub attestation_object: Option<String>,
}

/// Body of `POST /webauthn/response`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: Option<String>,
    pub raw_id: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub response: Option<AuthenticatorResponse>,
}

/// A registration response that passed every check up to attestation.
#[derive(Debug, Clone)]
pub struct ValidatedResponse {
    /// Decoded `rawId`.
    pub credential_id: Vec<u8>,
    pub client_data: ClientData,
    /// Decoded `attestationObject`.
    pub attestation_object: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ResponseValidator {
    origin: String,
}

impl ResponseValidator {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }

    /// Validate a raw request body.
    pub fn validate_raw(
        &self,
        body: &[u8],
        expected: Option<&Challenge>,
    ) -> Result<ValidatedResponse> {
        let response: RegistrationResponse = parse_body(body)?;
        self.validate(response, expected)
    }

    /// Validate a decoded response against the pending challenge.
    ///
    /// `expected` is `None` when the session holds no pending challenge, which
    /// is reported as a challenge mismatch once the structure checks pass.
    pub fn validate(
        &self,
        response: RegistrationResponse,
        expected: Option<&Challenge>,
    ) -> Result<ValidatedResponse> {
        let id = present(response.id).ok_or(ValidationError::MissingId)?;
        let raw_id = present(response.raw_id).ok_or(ValidationError::MissingRawId)?;
        let inner = response.response.ok_or(ValidationError::MissingResponse)?;
        let credential_type = present(response.type_).ok_or(ValidationError::MissingType)?;
        if credential_type != PUBLIC_KEY_TYPE {
            return Err(ValidationError::InvalidType.into());
        }

        let credential_id = match (encoding::decode(&id), encoding::decode(&raw_id)) {
            (Ok(a), Ok(b)) if a == b => b,
            _ => return Err(ValidationError::IdMismatch.into()),
        };

        let client_data_json =
            present(inner.client_data_json).ok_or(ValidationError::MissingClientData)?;
        let client_data = ClientData::from_base64url(&client_data_json)?;
        let collected = client_data.parsed();

        match expected {
            Some(challenge) if challenge.matches(&collected.challenge) => {}
            _ => return Err(CeremonyError::ChallengeMismatch),
        }

        if collected.origin != self.origin {
            return Err(CeremonyError::OriginMismatch {
                expected: self.origin.clone(),
                actual: collected.origin.clone(),
            });
        }

        let attestation_object = present(inner.attestation_object).ok_or_else(|| {
            CeremonyError::UnsupportedResponseType("response has no attestationObject".to_string())
        })?;
        if !collected.is_registration() {
            return Err(CeremonyError::UnsupportedResponseType(
                collected.ty.clone().unwrap_or_default(),
            ));
        }

        let attestation_object =
            encoding::decode(&attestation_object).map_err(|_| AttestationError::Encoding)?;

        Ok(ValidatedResponse {
            credential_id,
            client_data,
            attestation_object,
        })
    }
}
