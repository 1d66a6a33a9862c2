//! WebAuthn request/response types
//!
//! Wire shapes for the two ceremony endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to start a registration ceremony
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterBody {
    #[schema(example = "alice")]
    pub username: String,
    /// Display name
    #[schema(example = "Alice A.")]
    pub name: String,
}

/// Options passed to `navigator.credentials.create`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CeremonyParams {
    /// base64url of 32 random bytes
    pub challenge: String,
    pub rp: RpEntity,
    pub user: UserEntity,
    #[schema(example = "direct")]
    pub attestation: String,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RpEntity {
    #[schema(example = "WebAuthn Demo")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// base64url user handle
    pub id: String,
    /// Username
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    #[schema(example = "public-key")]
    pub type_: String,
    #[schema(example = -7)]
    pub alg: i64,
}

/// Credential response submitted by the client
///
/// Documentation only; the handler reads the raw body so that field
/// precedence is decided by the validator.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialBody {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type")]
    #[schema(example = "public-key")]
    pub type_: String,
    pub response: AttestationResponseBody,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttestationResponseBody {
    /// base64url client data JSON
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    /// base64url CBOR attestation object
    #[serde(rename = "attestationObject")]
    pub attestation_object: String,
}

/// Generic `{error}` message body; also used for success
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "registered credential successfully")]
    pub error: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Challenge mismatch")]
    pub error: String,
    #[schema(example = "CHALLENGE_MISMATCH")]
    pub code: String,
}

/// States of one registration ceremony, as logged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyState {
    Started,
    ResponseReceived,
    Validated,
    Verified,
    Persisted,
    Rejected,
}

impl CeremonyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::ResponseReceived => "RESPONSE_RECEIVED",
            Self::Validated => "VALIDATED",
            Self::Verified => "VERIFIED",
            Self::Persisted => "PERSISTED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for CeremonyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceremony_params_shape() {
        let params = CeremonyParams {
            challenge: "abc".into(),
            rp: RpEntity {
                name: "WebAuthn Demo".into(),
            },
            user: UserEntity {
                id: "uid".into(),
                name: "alice".into(),
                display_name: "Alice A.".into(),
            },
            attestation: "direct".into(),
            pub_key_cred_params: vec![PubKeyCredParam {
                type_: "public-key".into(),
                alg: -7,
            }],
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["user"]["displayName"], "Alice A.");
        assert_eq!(json["pubKeyCredParams"][0]["type"], "public-key");
        assert_eq!(json["pubKeyCredParams"][0]["alg"], -7);
        assert_eq!(json["attestation"], "direct");
    }
}
