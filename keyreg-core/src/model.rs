//! Persisted registration model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attestation::{AttestationFormat, AuthenticatorInfo};
use crate::challenge::generate_user_handle;
use crate::encoding;

/// An account, keyed externally by username.
///
/// `registered` is only ever set together with appending an authenticator, so
/// a registered user always has at least one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Display name.
    pub name: String,
    /// Opaque base64url user handle sent to the client.
    pub id: String,
    pub registered: bool,
    pub authenticators: Vec<Authenticator>,
}

impl User {
    /// A fresh, unregistered record with a new user handle.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: generate_user_handle(),
            registered: false,
            authenticators: Vec::new(),
        }
    }

    pub fn complete_registration(&mut self, authenticator: Authenticator) {
        self.authenticators.push(authenticator);
        self.registered = true;
    }
}

/// One enrolled credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticator {
    /// base64url credential ID.
    pub credential_id: String,
    /// base64url COSE_Key.
    pub public_key: String,
    pub algorithm: i64,
    pub sign_count: u32,
    /// Hex AAGUID; all zeroes for U2F devices.
    pub aaguid: String,
    pub fmt: AttestationFormat,
    pub created_at: DateTime<Utc>,
}

impl From<AuthenticatorInfo> for Authenticator {
    fn from(info: AuthenticatorInfo) -> Self {
        Self {
            credential_id: encoding::encode(&info.credential_id),
            public_key: encoding::encode(&info.public_key),
            algorithm: info.algorithm,
            sign_count: info.sign_count,
            aaguid: hex::encode(info.aaguid),
            fmt: info.format,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> AuthenticatorInfo {
        AuthenticatorInfo {
            credential_id: vec![1, 2, 3],
            public_key: vec![0xa5],
            algorithm: -7,
            sign_count: 5,
            aaguid: [0xab; 16],
            format: AttestationFormat::Packed,
        }
    }

    #[test]
    fn test_pending_user() {
        let user = User::pending("Alice A.");
        assert_eq!(user.name, "Alice A.");
        assert!(!user.registered);
        assert!(user.authenticators.is_empty());
        assert_ne!(user.id, User::pending("Alice A.").id);
    }

    #[test]
    fn test_complete_registration() {
        let mut user = User::pending("Alice A.");
        user.complete_registration(info().into());
        assert!(user.registered);
        assert_eq!(user.authenticators.len(), 1);

        let authenticator = &user.authenticators[0];
        assert_eq!(authenticator.credential_id, "AQID");
        assert_eq!(authenticator.aaguid, "ab".repeat(16));
        assert_eq!(authenticator.sign_count, 5);
    }

    #[test]
    fn test_authenticator_json_shape() {
        let authenticator = Authenticator::from(info());
        let json = serde_json::to_value(&authenticator).unwrap();
        assert_eq!(json["credentialId"], "AQID");
        assert_eq!(json["fmt"], "packed");
        assert_eq!(json["signCount"], 5);

        let back: Authenticator = serde_json::from_value(json).unwrap();
        assert_eq!(back, authenticator);
    }
}
