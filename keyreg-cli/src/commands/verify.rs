//! Verify command implementation.

use std::path::Path;

use anyhow::{anyhow, bail, Result};
use colored::Colorize;
use keyreg_core::{AttestationVerifier, Challenge, ResponseValidator, StandardVerifier, CHALLENGE_LEN};
use tracing::{debug, error, info};

use super::read_response;

pub struct Options {
    pub challenge: String,
    pub origin: String,
    pub rp_id: String,
    pub allow_none: bool,
    pub quiet: bool,
}

/// Execute the verify command.
pub fn execute(file: &Path, options: Options) -> Result<()> {
    let challenge = Challenge::from_base64url(&options.challenge).ok_or_else(|| {
        anyhow!("Invalid challenge: expected base64url of {CHALLENGE_LEN} bytes")
    })?;
    let origin = options.origin.trim_end_matches('/');
    if !(origin.starts_with("https://") || origin.starts_with("http://")) {
        bail!("Invalid origin: {origin}");
    }

    let body = read_response(file)?;

    let validated = ResponseValidator::new(origin)
        .validate_raw(&body, Some(&challenge))
        .map_err(|e| anyhow!("Verification failed: {e}"))?;
    debug!("Response validated");

    let result = StandardVerifier::new(&options.rp_id)
        .allow_none_attestation(options.allow_none)
        .verify(&validated)
        .map_err(|e| anyhow!("Verification failed: {e}"))?;

    let info = &result.authenticator_info;
    if !result.verified {
        let reason = result
            .rejection
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unverified".to_string());
        error!(reason = %reason, fmt = %info.format, "Attestation rejected");

        if !options.quiet {
            println!();
            println!("{}", "REJECTED".red().bold());
            println!("   {} {}", "Format:".dimmed(), info.format);
            println!("   {} {}", "Reason:".dimmed(), reason.red());
        }
        bail!("Verification failed: {reason}");
    }

    info!(fmt = %info.format, sign_count = info.sign_count, "Attestation verified");
    if !options.quiet {
        println!();
        println!("{}", "VERIFIED".green().bold());
        println!("   {} {}", "Format:".dimmed(), info.format);
        println!(
            "   {} {}",
            "Credential:".dimmed(),
            keyreg_core::encoding::encode(&info.credential_id)
        );
        println!("   {} {}", "Algorithm:".dimmed(), info.algorithm);
        println!("   {} {}", "Sign count:".dimmed(), info.sign_count);
        println!("   {} {}", "AAGUID:".dimmed(), hex::encode(info.aaguid));
    }
    Ok(())
}
