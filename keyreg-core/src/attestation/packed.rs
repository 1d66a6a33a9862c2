//! `packed` attestation.
//!
//! <https://w3c.github.io/webauthn/#sctn-packed-attestation>

use ciborium::value::Value;

use super::certificate;
use super::{map_get, Rejection};
use crate::cose::{CredentialPublicKey, ES256};
use crate::error::AttestationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedStatement {
    pub alg: i64,
    pub sig: Vec<u8>,
    /// Attestation certificate followed by its chain. Empty for self attestation.
    pub x5c: Vec<Vec<u8>>,
}

impl PackedStatement {
    pub(super) fn from_map(map: &[(Value, Value)]) -> Result<Self, AttestationError> {
        let alg = map_get(map, "alg")
            .and_then(Value::as_integer)
            .and_then(|i| i64::try_from(i).ok())
            .ok_or_else(|| AttestationError::MalformedStatement("missing alg".to_string()))?;

        let sig = map_get(map, "sig")
            .and_then(Value::as_bytes)
            .ok_or_else(|| AttestationError::MalformedStatement("missing sig".to_string()))?
            .clone();

        let x5c = match map_get(map, "x5c") {
            None => Vec::new(),
            Some(value) => {
                let certs = certificate::chain_from_value(value)?;
                if certs.is_empty() {
                    return Err(AttestationError::MalformedStatement(
                        "x5c is empty".to_string(),
                    ));
                }
                certs
            }
        };

        Ok(Self { alg, sig, x5c })
    }

    /// The signed data is `authData || clientDataHash`.
    pub(super) fn verify(
        &self,
        auth_data: &[u8],
        client_data_hash: &[u8; 32],
        credential_key: &CredentialPublicKey,
    ) -> Result<Option<Rejection>, AttestationError> {
        let mut signed = Vec::with_capacity(auth_data.len() + client_data_hash.len());
        signed.extend_from_slice(auth_data);
        signed.extend_from_slice(client_data_hash);

        let valid = match self.x5c.first() {
            Some(leaf) => {
                if self.alg != ES256 {
                    return Err(AttestationError::UnsupportedAlgorithm(self.alg));
                }
                certificate::public_key(leaf)?.verify(&signed, &self.sig)
            }
            None => {
                if self.alg != credential_key.algorithm() {
                    return Ok(Some(Rejection::AlgorithmMismatch));
                }
                credential_key.verify(&signed, &self.sig)
            }
        };

        Ok((!valid).then_some(Rejection::BadSignature))
    }
}
