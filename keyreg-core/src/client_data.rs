//! Collected client data.
//!
//! The client data JSON is signed indirectly: the authenticator signs its
//! SHA-256 hash. The raw bytes are therefore kept next to the parsed view.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::encoding;
use crate::error::ValidationError;

/// `type` value produced by `navigator.credentials.create()`.
pub const TYPE_WEBAUTHN_CREATE: &str = "webauthn.create";

/// `typ` value produced by legacy U2F `register()` calls.
pub const TYPE_U2F_REGISTER: &str = "navigator.id.finishEnrollment";

/// The parsed fields of `clientDataJSON`.
///
/// <https://w3c.github.io/webauthn/#dictdef-collectedclientdata>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    /// `webauthn.create` for registrations. U2F clients call this `typ`.
    #[serde(rename = "type", alias = "typ", default)]
    pub ty: Option<String>,

    /// base64url challenge echoed back by the client.
    pub challenge: String,

    /// Origin of the page that ran the ceremony.
    pub origin: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_origin: Option<String>,
}

impl CollectedClientData {
    /// Whether the client reported a credential-creation ceremony.
    ///
    /// A missing type is tolerated; the presence of an attestation object is
    /// what marks a registration.
    pub fn is_registration(&self) -> bool {
        match self.ty.as_deref() {
            None => true,
            Some(ty) => ty == TYPE_WEBAUTHN_CREATE || ty == TYPE_U2F_REGISTER,
        }
    }
}

/// Client data as received, plus its parsed form.
#[derive(Debug, Clone)]
pub struct ClientData {
    raw: Vec<u8>,
    parsed: CollectedClientData,
}

impl ClientData {
    /// Decode `response.clientDataJSON` (base64url of UTF-8 JSON).
    pub fn from_base64url(encoded: &str) -> Result<Self, ValidationError> {
        let raw = encoding::decode(encoded)
            .map_err(|e| ValidationError::InvalidClientData(format!("not base64url: {}", e)))?;
        Self::from_bytes(raw)
    }

    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, ValidationError> {
        let parsed = serde_json::from_slice(&raw)
            .map_err(|e| ValidationError::InvalidClientData(e.to_string()))?;
        Ok(Self { raw, parsed })
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn parsed(&self) -> &CollectedClientData {
        &self.parsed
    }

    /// SHA-256 of the exact bytes the client sent.
    pub fn hash(&self) -> [u8; 32] {
        Sha256::digest(&self.raw).into()
    }
}
