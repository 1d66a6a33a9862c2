//! `fido-u2f` attestation.
//!
//! <https://w3c.github.io/webauthn/#sctn-fido-u2f-attestation>

use ciborium::value::Value;

use super::certificate;
use super::{map_get, Rejection};
use crate::cose::CredentialPublicKey;
use crate::error::AttestationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FidoU2fStatement {
    pub sig: Vec<u8>,
    pub attestation_certificate: Vec<u8>,
}

impl FidoU2fStatement {
    pub(super) fn from_map(map: &[(Value, Value)]) -> Result<Self, AttestationError> {
        let sig = map_get(map, "sig")
            .and_then(Value::as_bytes)
            .ok_or_else(|| AttestationError::MalformedStatement("missing sig".to_string()))?
            .clone();

        let x5c = map_get(map, "x5c")
            .ok_or_else(|| AttestationError::MalformedStatement("missing x5c".to_string()))?;
        let mut certs = certificate::chain_from_value(x5c)?;
        if certs.len() != 1 {
            return Err(AttestationError::MalformedStatement(format!(
                "x5c must hold exactly one certificate, found {}",
                certs.len()
            )));
        }

        Ok(Self {
            sig,
            attestation_certificate: certs.remove(0),
        })
    }

    /// The signed data is
    /// `0x00 || rpIdHash || clientDataHash || credentialId || publicKeyU2F`
    /// where `publicKeyU2F` is the uncompressed credential point.
    pub(super) fn verify(
        &self,
        rp_id_hash: &[u8; 32],
        client_data_hash: &[u8; 32],
        credential_id: &[u8],
        credential_key: &CredentialPublicKey,
    ) -> Result<Option<Rejection>, AttestationError> {
        let certificate_key = certificate::public_key(&self.attestation_certificate)?;

        let signed: Vec<u8> = [0x00]
            .iter()
            .chain(rp_id_hash.iter())
            .chain(client_data_hash.iter())
            .chain(credential_id.iter())
            .chain(credential_key.uncompressed_point().iter())
            .copied()
            .collect();

        let valid = certificate_key.verify(&signed, &self.sig);
        Ok((!valid).then_some(Rejection::BadSignature))
    }
}
