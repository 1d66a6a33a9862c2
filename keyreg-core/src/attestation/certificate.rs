use ciborium::value::Value;

use crate::cose::CredentialPublicKey;
use crate::error::AttestationError;

/// Decode an `x5c` CBOR array into DER certificates.
pub(super) fn chain_from_value(value: &Value) -> Result<Vec<Vec<u8>>, AttestationError> {
    value
        .as_array()
        .ok_or_else(|| AttestationError::MalformedStatement("x5c is not an array".to_string()))?
        .iter()
        .map(|cert| {
            cert.as_bytes().cloned().ok_or_else(|| {
                AttestationError::MalformedStatement("x5c entry is not a byte string".to_string())
            })
        })
        .collect()
}

/// Extract the P-256 subject key from a DER certificate.
pub(super) fn public_key(der: &[u8]) -> Result<CredentialPublicKey, AttestationError> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| AttestationError::InvalidCertificate(e.to_string()))?;

    CredentialPublicKey::from_sec1_bytes(&cert.public_key().subject_public_key.data).map_err(
        |_| AttestationError::InvalidCertificate("subject key is not a P-256 point".to_string()),
    )
}
