//! A software authenticator for tests.
//!
//! [`SoftAuthenticator`] holds a real P-256 credential key and produces
//! registration responses in the same JSON shape a browser posts, with genuine
//! `packed`, `fido-u2f` or `none` attestations. [`Tamper`] breaks one aspect of
//! a response at a time.

use ciborium::value::Value;
use coset::{iana, CborSerializable, CoseKeyBuilder};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey, EcPoint};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Builder, X509NameBuilder};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::authenticator_data::Flags;
use crate::challenge::Challenge;
use crate::client_data::TYPE_WEBAUTHN_CREATE;
use crate::cose::ES256;
use crate::encoding;
use crate::validator::PUBLIC_KEY_TYPE;

/// Attestation the authenticator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    PackedSelf,
    PackedX5c,
    FidoU2f,
    None,
}

/// One deliberate defect in a generated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tamper {
    None,
    /// Valid DER signature over different bytes.
    Signature,
    /// A signature that is not DER at all.
    GarbageSignature,
    ClearUserPresent,
    /// Override the `alg` in a packed statement.
    StatementAlg(i64),
    /// Override `fmt`.
    Format(&'static str),
    /// Override `clientData.type`.
    ClientDataType(&'static str),
    OmitAttestationObject,
}

#[derive(Clone)]
pub struct SoftAuthenticator {
    mode: Mode,
    credential_key: SigningKey,
    attestation_key: SigningKey,
    credential_id: Vec<u8>,
    aaguid: [u8; 16],
    sign_count: u32,
}

impl SoftAuthenticator {
    pub fn new(mode: Mode) -> Self {
        let mut rng = rand::thread_rng();
        let mut credential_id = vec![0u8; 32];
        rng.fill_bytes(&mut credential_id);
        let aaguid = match mode {
            Mode::FidoU2f => [0u8; 16],
            _ => {
                let mut aaguid = [0u8; 16];
                rng.fill_bytes(&mut aaguid);
                aaguid
            }
        };

        Self {
            mode,
            credential_key: SigningKey::random(&mut rng),
            attestation_key: SigningKey::random(&mut rng),
            credential_id,
            aaguid,
            sign_count: 0,
        }
    }

    pub fn packed_self() -> Self {
        Self::new(Mode::PackedSelf)
    }

    pub fn packed_x5c() -> Self {
        Self::new(Mode::PackedX5c)
    }

    pub fn fido_u2f() -> Self {
        Self::new(Mode::FidoU2f)
    }

    pub fn none() -> Self {
        Self::new(Mode::None)
    }

    pub fn with_sign_count(mut self, sign_count: u32) -> Self {
        self.sign_count = sign_count;
        self
    }

    pub fn credential_id(&self) -> Vec<u8> {
        self.credential_id.clone()
    }

    pub fn credential_id_base64url(&self) -> String {
        encoding::encode(&self.credential_id)
    }

    /// A well-formed registration response for `challenge`.
    pub fn register(&self, challenge: &Challenge, origin: &str, rp_id: &str) -> serde_json::Value {
        self.register_with(challenge, origin, rp_id, Tamper::None)
    }

    /// Like [`SoftAuthenticator::register`], with one defect applied.
    pub fn register_with(
        &self,
        challenge: &Challenge,
        origin: &str,
        rp_id: &str,
        tamper: Tamper,
    ) -> serde_json::Value {
        let ty = match tamper {
            Tamper::ClientDataType(ty) => ty,
            _ => TYPE_WEBAUTHN_CREATE,
        };
        let client_data_json = json!({
            "type": ty,
            "challenge": challenge.to_base64url(),
            "origin": origin,
            "crossOrigin": false,
        })
        .to_string()
        .into_bytes();
        let client_data_hash: [u8; 32] = Sha256::digest(&client_data_json).into();

        let rp_id_hash: [u8; 32] = Sha256::digest(rp_id.as_bytes()).into();
        let mut flags = Flags::UP | Flags::AT;
        if self.mode != Mode::FidoU2f {
            flags |= Flags::UV;
        }
        if tamper == Tamper::ClearUserPresent {
            flags.remove(Flags::UP);
        }
        let auth_data = self.auth_data(&rp_id_hash, flags);

        let fmt = match tamper {
            Tamper::Format(fmt) => fmt.to_string(),
            _ => self.format_name().to_string(),
        };
        let statement = self.statement(&auth_data, &rp_id_hash, &client_data_hash, tamper);
        let attestation_object = to_cbor(&Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text(fmt)),
            (Value::Text("attStmt".into()), statement),
            (Value::Text("authData".into()), Value::Bytes(auth_data)),
        ]));

        let mut response = json!({
            "clientDataJSON": encoding::encode(&client_data_json),
            "attestationObject": encoding::encode(&attestation_object),
        });
        if tamper == Tamper::OmitAttestationObject {
            if let Some(map) = response.as_object_mut() {
                map.remove("attestationObject");
            }
        }

        let id = self.credential_id_base64url();
        json!({
            "id": id,
            "rawId": id,
            "type": PUBLIC_KEY_TYPE,
            "response": response,
        })
    }

    fn format_name(&self) -> &'static str {
        match self.mode {
            Mode::PackedSelf | Mode::PackedX5c => "packed",
            Mode::FidoU2f => "fido-u2f",
            Mode::None => "none",
        }
    }

    fn uncompressed_point(&self) -> Vec<u8> {
        self.credential_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    fn cose_key(&self) -> Vec<u8> {
        let point = self.uncompressed_point();
        CoseKeyBuilder::new_ec2_pub_key(
            iana::EllipticCurve::P_256,
            point[1..33].to_vec(),
            point[33..].to_vec(),
        )
        .algorithm(iana::Algorithm::ES256)
        .build()
        .to_vec()
        .expect("COSE key encodes")
    }

    fn auth_data(&self, rp_id_hash: &[u8; 32], flags: Flags) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(rp_id_hash);
        data.push(flags.bits());
        data.extend_from_slice(&self.sign_count.to_be_bytes());
        data.extend_from_slice(&self.aaguid);
        data.extend_from_slice(&(self.credential_id.len() as u16).to_be_bytes());
        data.extend_from_slice(&self.credential_id);
        data.extend_from_slice(&self.cose_key());
        data
    }

    fn statement(
        &self,
        auth_data: &[u8],
        rp_id_hash: &[u8; 32],
        client_data_hash: &[u8; 32],
        tamper: Tamper,
    ) -> Value {
        let text = |s: &str| Value::Text(s.to_string());
        let alg = match tamper {
            Tamper::StatementAlg(alg) => alg,
            _ => ES256,
        };

        match self.mode {
            Mode::None => Value::Map(Vec::new()),
            Mode::PackedSelf | Mode::PackedX5c => {
                let signed = [auth_data, client_data_hash.as_slice()].concat();
                let key = match self.mode {
                    Mode::PackedSelf => &self.credential_key,
                    _ => &self.attestation_key,
                };
                let mut map = vec![
                    (text("alg"), Value::Integer(alg.into())),
                    (text("sig"), Value::Bytes(sign(key, &signed, tamper))),
                ];
                if self.mode == Mode::PackedX5c {
                    map.push((text("x5c"), self.x5c()));
                }
                Value::Map(map)
            }
            Mode::FidoU2f => {
                let signed = [
                    &[0x00][..],
                    rp_id_hash.as_slice(),
                    client_data_hash.as_slice(),
                    self.credential_id.as_slice(),
                    self.uncompressed_point().as_slice(),
                ]
                .concat();
                Value::Map(vec![
                    (
                        text("sig"),
                        Value::Bytes(sign(&self.attestation_key, &signed, tamper)),
                    ),
                    (text("x5c"), self.x5c()),
                ])
            }
        }
    }

    fn x5c(&self) -> Value {
        let der = self_signed_certificate(&self.attestation_key, "keyreg soft authenticator")
            .expect("attestation certificate builds");
        Value::Array(vec![Value::Bytes(der)])
    }
}

fn sign(key: &SigningKey, message: &[u8], tamper: Tamper) -> Vec<u8> {
    match tamper {
        Tamper::GarbageSignature => vec![0xde, 0xad, 0xbe, 0xef],
        Tamper::Signature => {
            let mut other = message.to_vec();
            if let Some(last) = other.last_mut() {
                *last ^= 0x01;
            }
            let sig: Signature = key.sign(&other);
            sig.to_der().as_bytes().to_vec()
        }
        _ => {
            let sig: Signature = key.sign(message);
            sig.to_der().as_bytes().to_vec()
        }
    }
}

fn to_cbor(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).expect("CBOR into a Vec");
    out
}

/// A self-signed X.509 v3 attestation certificate for `key`.
pub fn self_signed_certificate(
    key: &SigningKey,
    common_name: &str,
) -> Result<Vec<u8>, ErrorStack> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
    let mut ctx = BigNumContext::new()?;
    let point = EcPoint::from_bytes(
        &group,
        key.verifying_key().to_encoded_point(false).as_bytes(),
        &mut ctx,
    )?;
    let scalar = BigNum::from_slice(&key.to_bytes())?;
    let private_key = PKey::from_ec_key(EcKey::from_private_components(&group, &scalar, &point)?)?;

    let mut builder = X509Builder::new()?;
    builder.set_version(2)?;
    let serial = BigNum::from_u32(1)?.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;

    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_text("O", "keyreg")?;
    name.append_entry_by_text("OU", "Authenticator Attestation")?;
    name.append_entry_by_text("CN", common_name)?;
    let name = name.build();
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;

    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(365)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;
    builder.set_pubkey(&private_key)?;
    builder.append_extension(BasicConstraints::new().critical().build()?)?;

    builder.sign(&private_key, MessageDigest::sha256())?;
    builder.build().to_der()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::{AttestationFormat, AttestationObject};

    #[test]
    fn test_generated_response_shape() {
        let authenticator = SoftAuthenticator::fido_u2f().with_sign_count(7);
        let challenge = Challenge::generate();
        let body = authenticator.register(&challenge, "https://example.com", "example.com");

        assert_eq!(body["id"], body["rawId"]);
        assert_eq!(body["type"], "public-key");

        let object = AttestationObject::from_base64url(
            body["response"]["attestationObject"].as_str().unwrap(),
        )
        .unwrap();
        assert_eq!(object.format, AttestationFormat::FidoU2f);
        assert_eq!(object.auth_data.sign_count, 7);
        assert_eq!(
            object.auth_data.attested_credential.unwrap().credential_id,
            authenticator.credential_id()
        );
    }

    #[test]
    fn test_x5c_certificate_carries_attestation_key() {
        let authenticator = SoftAuthenticator::packed_x5c();
        let Value::Array(chain) = authenticator.x5c() else {
            panic!("x5c is an array");
        };
        let Value::Bytes(der) = &chain[0] else {
            panic!("certificate is a byte string");
        };

        let (_, cert) = x509_parser::parse_x509_certificate(der).unwrap();
        assert_eq!(cert.version(), x509_parser::x509::X509Version::V3);
        assert_eq!(cert.subject().to_string(), cert.issuer().to_string());
        assert_eq!(
            cert.public_key().subject_public_key.data.as_ref(),
            authenticator
                .attestation_key
                .verifying_key()
                .to_encoded_point(false)
                .as_bytes()
        );
    }
}
