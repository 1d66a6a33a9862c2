//! Inspect command implementation.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use keyreg_core::{
    encoding, parse_body, AttestationObject, ClientData, CredentialPublicKey, Flags,
    RegistrationResponse,
};
use serde_json::{json, Value};

use super::read_response;

/// Execute the inspect command.
pub fn execute(file: &Path, as_json: bool) -> Result<()> {
    let body = read_response(file)?;
    let report = decode(&body)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Decode every layer of a registration response into a JSON report.
///
/// No binding or signature checks are made here.
pub fn decode(body: &[u8]) -> Result<Value> {
    let response: RegistrationResponse =
        parse_body(body).context("Failed to parse response file")?;
    let inner = response
        .response
        .ok_or_else(|| anyhow!("Failed to parse response file: no response member"))?;

    let client_data = inner
        .client_data_json
        .as_deref()
        .ok_or_else(|| anyhow!("Failed to parse response file: no clientDataJSON"))
        .and_then(|encoded| {
            ClientData::from_base64url(encoded).context("Failed to parse clientDataJSON")
        })?;
    let collected = client_data.parsed();

    let attestation = match inner.attestation_object.as_deref() {
        Some(encoded) => Some(
            AttestationObject::from_base64url(encoded)
                .context("Failed to parse attestationObject")?,
        ),
        None => None,
    };

    let attestation = match attestation {
        None => Value::Null,
        Some(object) => {
            let auth_data = &object.auth_data;
            let credential = match &auth_data.attested_credential {
                None => Value::Null,
                Some(credential) => {
                    let algorithm = CredentialPublicKey::from_cose(&credential.public_key)
                        .map(|key| json!(key.algorithm()))
                        .unwrap_or(Value::Null);
                    json!({
                        "aaguid": hex::encode(credential.aaguid),
                        "credentialId": encoding::encode(&credential.credential_id),
                        "matchesRawId": response.raw_id.as_deref()
                            == Some(encoding::encode(&credential.credential_id).as_str()),
                        "algorithm": algorithm,
                        "publicKey": encoding::encode(&credential.public_key_bytes),
                    })
                }
            };
            json!({
                "fmt": object.format.as_str(),
                "rpIdHash": hex::encode(auth_data.rp_id_hash),
                "flags": flag_names(auth_data.flags),
                "signCount": auth_data.sign_count,
                "credential": credential,
                "extensions": auth_data.extensions.is_some(),
            })
        }
    };

    Ok(json!({
        "id": response.id,
        "rawId": response.raw_id,
        "type": response.type_,
        "clientData": {
            "type": collected.ty,
            "challenge": collected.challenge,
            "origin": collected.origin,
            "crossOrigin": collected.cross_origin,
        },
        "attestation": attestation,
    }))
}

fn flag_names(flags: Flags) -> Vec<&'static str> {
    flags.iter_names().map(|(name, _)| name).collect()
}

fn print_report(report: &Value) {
    let field = |label: &str, value: &Value| {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Null => "-".dimmed().to_string(),
            other => other.to_string(),
        };
        println!("   {} {}", format!("{label}:").dimmed(), text);
    };

    println!();
    println!("{}", "Credential".bold());
    field("id", &report["id"]);
    field("type", &report["type"]);

    println!();
    println!("{}", "Client data".bold());
    field("type", &report["clientData"]["type"]);
    field("challenge", &report["clientData"]["challenge"]);
    field("origin", &report["clientData"]["origin"]);

    println!();
    let attestation = &report["attestation"];
    if attestation.is_null() {
        println!("{}", "No attestationObject (not a registration response)".yellow());
        return;
    }
    println!("{}", "Attestation".bold());
    field("fmt", &attestation["fmt"]);
    field("rpIdHash", &attestation["rpIdHash"]);
    field("flags", &attestation["flags"]);
    field("signCount", &attestation["signCount"]);

    let credential = &attestation["credential"];
    if credential.is_null() {
        println!("   {}", "No attested credential data".yellow());
        return;
    }
    field("aaguid", &credential["aaguid"]);
    field("credentialId", &credential["credentialId"]);
    field("algorithm", &credential["algorithm"]);
    if credential["matchesRawId"] != Value::Bool(true) {
        println!("   {}", "Attested credential id differs from rawId".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyreg_core::testing::SoftAuthenticator;
    use keyreg_core::Challenge;

    #[test]
    fn test_decode_packed_response() {
        let challenge = Challenge::generate();
        let authenticator = SoftAuthenticator::packed_self().with_sign_count(7);
        let body = authenticator
            .register(&challenge, "https://example.com", "example.com")
            .to_string();

        let report = decode(body.as_bytes()).unwrap();
        assert_eq!(report["clientData"]["challenge"], challenge.to_base64url());
        assert_eq!(report["clientData"]["origin"], "https://example.com");
        assert_eq!(report["attestation"]["fmt"], "packed");
        assert_eq!(report["attestation"]["signCount"], 7);
        assert_eq!(report["attestation"]["credential"]["algorithm"], -7);
        assert_eq!(report["attestation"]["credential"]["matchesRawId"], true);

        let flags = report["attestation"]["flags"].as_array().unwrap();
        assert!(flags.contains(&json!("UP")));
        assert!(flags.contains(&json!("AT")));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"[]").is_err());
        assert!(decode(br#"{"id":"x"}"#).is_err());
    }
}
