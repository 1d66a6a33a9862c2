//! base64url helpers.
//!
//! WebAuthn transports every binary field as unpadded base64url. Decoding
//! tolerates trailing `=` padding since some clients still emit it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::{DecodeError, Engine};

/// Encode bytes as unpadded base64url.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode base64url, with or without padding.
pub fn decode(input: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD.decode(input.trim_end_matches('='))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_unpadded_and_url_safe() {
        let encoded = encode([0xfb, 0xff, 0xfe]);
        assert_eq!(encoded, "-__-");
        assert!(!encode([0u8; 1]).contains('='));
    }

    #[test]
    fn test_decode_accepts_padding() {
        assert_eq!(decode("AA==").unwrap(), vec![0]);
        assert_eq!(decode("AA").unwrap(), vec![0]);
    }

    #[test]
    fn test_decode_rejects_standard_alphabet() {
        assert!(decode("+/+/").is_err());
    }
}
