//! Ceremony challenges and user handles.

use rand::RngCore;

use crate::encoding;

/// Size of a registration challenge in bytes.
pub const CHALLENGE_LEN: usize = 32;

/// Size of the opaque WebAuthn user handle in bytes.
pub const USER_HANDLE_LEN: usize = 32;

/// A single-use registration challenge.
///
/// The `Debug` impl never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Challenge([u8; CHALLENGE_LEN]);

impl Challenge {
    /// Draw a fresh challenge from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; CHALLENGE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; CHALLENGE_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a challenge previously produced by [`Challenge::to_base64url`].
    ///
    /// Returns `None` if the value does not decode to exactly 32 bytes.
    pub fn from_base64url(encoded: &str) -> Option<Self> {
        let bytes = encoding::decode(encoded).ok()?;
        let bytes: [u8; CHALLENGE_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64url(&self) -> String {
        encoding::encode(self.0)
    }

    /// Byte-for-byte comparison against the challenge echoed in client data.
    pub fn matches(&self, presented: &str) -> bool {
        encoding::decode(presented)
            .map(|bytes| bytes.as_slice() == self.0.as_slice())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for Challenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Challenge").field(&"[REDACTED]").finish()
    }
}

/// Generate a fresh base64url user handle.
pub fn generate_user_handle() -> String {
    let mut bytes = [0u8; USER_HANDLE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    encoding::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenges_are_distinct() {
        let a = Challenge::generate();
        let b = Challenge::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_base64url_round_trip() {
        let challenge = Challenge::generate();
        let encoded = challenge.to_base64url();
        assert_eq!(encoded.len(), 43);
        assert_eq!(Challenge::from_base64url(&encoded), Some(challenge));
    }

    #[test]
    fn test_from_base64url_rejects_wrong_length() {
        assert!(Challenge::from_base64url(&encoding::encode([0u8; 16])).is_none());
        assert!(Challenge::from_base64url("not base64!").is_none());
    }

    #[test]
    fn test_matches_is_byte_exact() {
        let challenge = Challenge::from_bytes([7u8; CHALLENGE_LEN]);
        assert!(challenge.matches(&encoding::encode([7u8; CHALLENGE_LEN])));

        let mut other = [7u8; CHALLENGE_LEN];
        other[31] = 8;
        assert!(!challenge.matches(&encoding::encode(other)));
        assert!(!challenge.matches(""));
    }

    #[test]
    fn test_debug_redacts_value() {
        let challenge = Challenge::from_bytes([1u8; CHALLENGE_LEN]);
        let debug = format!("{:?}", challenge);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&challenge.to_base64url()));
    }

    #[test]
    fn test_user_handle_is_32_bytes() {
        let handle = generate_user_handle();
        assert_eq!(encoding::decode(&handle).unwrap().len(), USER_HANDLE_LEN);
        assert_ne!(handle, generate_user_handle());
    }
}
