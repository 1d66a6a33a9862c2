//! Credential public keys.
//!
//! Only EC2 keys on P-256 used with ES256 are accepted.

use coset::iana::{self, EnumI64};
use coset::{CoseKey, KeyType, Label, RegisteredLabelWithPrivate};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};

use crate::error::AttestationError;

/// COSE algorithm identifier for ECDSA w/ SHA-256.
pub const ES256: i64 = -7;

/// A credential public key that can check signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPublicKey {
    key: VerifyingKey,
}

fn ec2_param<'a>(key: &'a CoseKey, param: iana::Ec2KeyParameter) -> Option<&'a ciborium::Value> {
    let label = Label::Int(param.to_i64());
    key.params
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, value)| value)
}

fn coordinate(key: &CoseKey, param: iana::Ec2KeyParameter) -> Result<[u8; 32], AttestationError> {
    let bytes = ec2_param(key, param)
        .and_then(|v| v.as_bytes())
        .ok_or_else(|| AttestationError::InvalidPublicKey(format!("missing {:?}", param)))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| AttestationError::InvalidPublicKey(format!("{:?} is not 32 bytes", param)))
}

impl CredentialPublicKey {
    /// Extract an ES256 key from a COSE_Key.
    pub fn from_cose(key: &CoseKey) -> Result<Self, AttestationError> {
        match &key.alg {
            Some(RegisteredLabelWithPrivate::Assigned(iana::Algorithm::ES256)) => {}
            Some(RegisteredLabelWithPrivate::Assigned(alg)) => {
                return Err(AttestationError::UnsupportedAlgorithm(alg.to_i64()))
            }
            Some(RegisteredLabelWithPrivate::PrivateUse(alg)) => {
                return Err(AttestationError::UnsupportedAlgorithm(*alg))
            }
            Some(RegisteredLabelWithPrivate::Text(alg)) => {
                return Err(AttestationError::InvalidPublicKey(format!(
                    "text algorithm {}",
                    alg
                )))
            }
            None => {
                return Err(AttestationError::InvalidPublicKey(
                    "missing alg".to_string(),
                ))
            }
        }

        if key.kty != KeyType::Assigned(iana::KeyType::EC2) {
            return Err(AttestationError::InvalidPublicKey(format!(
                "expected EC2 key, got {:?}",
                key.kty
            )));
        }

        let curve = ec2_param(key, iana::Ec2KeyParameter::Crv)
            .and_then(|v| v.as_integer())
            .and_then(|i| i64::try_from(i).ok());
        if curve != Some(iana::EllipticCurve::P_256.to_i64()) {
            return Err(AttestationError::InvalidPublicKey(
                "curve is not P-256".to_string(),
            ));
        }

        let x = coordinate(key, iana::Ec2KeyParameter::X)?;
        let y = coordinate(key, iana::Ec2KeyParameter::Y)?;
        Self::from_coordinates(&x, &y)
    }

    pub fn from_coordinates(x: &[u8; 32], y: &[u8; 32]) -> Result<Self, AttestationError> {
        let mut point = [0u8; 65];
        point[0] = 0x04;
        point[1..33].copy_from_slice(x);
        point[33..].copy_from_slice(y);
        Self::from_sec1_bytes(&point)
    }

    /// Accept a SEC1 encoded point, as found in a certificate's SubjectPublicKeyInfo.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, AttestationError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(|key| Self { key })
            .map_err(|_| AttestationError::InvalidPublicKey("not a P-256 point".to_string()))
    }

    pub fn algorithm(&self) -> i64 {
        ES256
    }

    /// Uncompressed SEC1 point, `0x04 || x || y`.
    pub fn uncompressed_point(&self) -> [u8; 65] {
        let point = self.key.to_encoded_point(false);
        let mut out = [0u8; 65];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Check a DER encoded ECDSA signature over `message`.
    ///
    /// A signature that does not decode is treated as invalid.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match Signature::from_der(signature) {
            Ok(sig) => self.key.verify(message, &sig).is_ok(),
            Err(_) => false,
        }
    }
}
