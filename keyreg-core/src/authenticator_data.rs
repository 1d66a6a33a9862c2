//! Authenticator data parsing.
//!
//! <https://w3c.github.io/webauthn/#sctn-authenticator-data>
//!
//! ```text
//! rpIdHash (32) | flags (1) | signCount (4, big-endian)
//!   [ aaguid (16) | credentialIdLength (2, big-endian) | credentialId | COSE_Key ]   if AT
//!   [ extensions (CBOR map) ]                                                       if ED
//! ```

use std::io::{Cursor, Read};

use bitflags::bitflags;
use ciborium::value::Value;
use coset::{AsCborValue, CoseKey};

use crate::error::AttestationError;

/// rpIdHash + flags + signCount
const FIXED_LEN: usize = 32 + 1 + 4;

bitflags! {
    /// Flags byte of the authenticator data.
    ///
    /// <https://w3c.github.io/webauthn/#authdata-flags>
    #[repr(transparent)]
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct Flags: u8 {
        /// User Present, bit 0
        const UP = 1 << 0;
        /// User Verified, bit 2
        const UV = 1 << 2;
        /// Backup Eligibility, bit 3
        const BE = 1 << 3;
        /// Backup State, bit 4
        const BS = 1 << 4;
        /// Attested Credential Data, bit 6
        const AT = 1 << 6;
        /// Extension Data Included, bit 7
        const ED = 1 << 7;
    }
}

/// Attested credential data carried by a registration.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredential {
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
    /// Decoded COSE key.
    pub public_key: CoseKey,
    /// The COSE key exactly as it appeared in the authenticator data.
    pub public_key_bytes: Vec<u8>,
}

/// Parsed authenticator data.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: Flags,
    pub sign_count: u32,
    pub attested_credential: Option<AttestedCredential>,
    pub extensions: Option<Value>,
}

fn truncated<E>(_: E) -> AttestationError {
    AttestationError::MalformedAuthData("truncated".to_string())
}

impl AuthenticatorData {
    /// Decode authenticator data from its byte representation.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AttestationError> {
        if bytes.len() < FIXED_LEN {
            return Err(AttestationError::MalformedAuthData(format!(
                "{} bytes is shorter than the {} byte header",
                bytes.len(),
                FIXED_LEN
            )));
        }

        let (rp_id_hash, rest) = bytes.split_at(32);
        let (flag_byte, rest) = rest.split_at(1);
        let (counter, rest) = rest.split_at(4);

        // Reserved bits are kept rather than rejected.
        let flags = Flags::from_bits_retain(flag_byte[0]);

        let mut reader = Cursor::new(rest);
        let attested_credential = if flags.contains(Flags::AT) {
            Some(AttestedCredential::from_reader(&mut reader)?)
        } else {
            None
        };

        let extensions = if flags.contains(Flags::ED) {
            let value: Value = ciborium::de::from_reader(&mut reader).map_err(|e| {
                AttestationError::MalformedAuthData(format!("extensions: {}", e))
            })?;
            if !value.is_map() {
                return Err(AttestationError::MalformedAuthData(
                    "extensions are not a CBOR map".to_string(),
                ));
            }
            Some(value)
        } else {
            None
        };

        let consumed = usize::try_from(reader.position()).map_err(truncated)?;
        if consumed != rest.len() {
            return Err(AttestationError::MalformedAuthData(format!(
                "{} trailing bytes",
                rest.len() - consumed
            )));
        }

        let mut rp_id_hash_arr = [0u8; 32];
        rp_id_hash_arr.copy_from_slice(rp_id_hash);
        let mut counter_arr = [0u8; 4];
        counter_arr.copy_from_slice(counter);

        Ok(Self {
            rp_id_hash: rp_id_hash_arr,
            flags,
            sign_count: u32::from_be_bytes(counter_arr),
            attested_credential,
            extensions,
        })
    }

    pub fn user_present(&self) -> bool {
        self.flags.contains(Flags::UP)
    }

    pub fn user_verified(&self) -> bool {
        self.flags.contains(Flags::UV)
    }
}

impl AttestedCredential {
    fn from_reader(reader: &mut Cursor<&[u8]>) -> Result<Self, AttestationError> {
        let mut aaguid = [0u8; 16];
        reader.read_exact(&mut aaguid).map_err(truncated)?;

        let mut len = [0u8; 2];
        reader.read_exact(&mut len).map_err(truncated)?;
        let len = usize::from(u16::from_be_bytes(len));

        let mut credential_id = vec![0u8; len];
        reader.read_exact(&mut credential_id).map_err(truncated)?;

        let start = usize::try_from(reader.position()).map_err(truncated)?;
        let value: Value = ciborium::de::from_reader(&mut *reader)
            .map_err(|e| AttestationError::InvalidPublicKey(e.to_string()))?;
        let end = usize::try_from(reader.position()).map_err(truncated)?;
        let public_key_bytes = reader.get_ref()[start..end].to_vec();

        let public_key = CoseKey::from_cbor_value(value)
            .map_err(|e| AttestationError::InvalidPublicKey(format!("{:?}", e)))?;

        Ok(Self {
            aaguid,
            credential_id,
            public_key,
            public_key_bytes,
        })
    }
}
