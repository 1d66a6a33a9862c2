//! WebAuthn Relying Party configuration

use url::Url;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid origin URL: {0}")]
    InvalidOrigin(String),
}

/// Relying Party identity the ceremony is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    /// Display name sent in ceremony parameters
    pub name: String,
    /// RP ID whose SHA-256 must appear in authenticator data
    pub id: String,
    /// Exact origin expected in client data, without trailing slash
    pub origin: String,
    /// Accept `fmt = "none"` attestations as verified
    pub allow_none_attestation: bool,
}

impl RelyingParty {
    /// Create a new Relying Party
    ///
    /// # Arguments
    ///
    /// * `rp_id` - Relying Party ID (typically the domain name)
    /// * `rp_origin` - Relying Party origin URL
    /// * `rp_name` - Human-readable name for the Relying Party
    pub fn new(rp_id: &str, rp_origin: &Url, rp_name: &str) -> Self {
        Self {
            name: rp_name.to_string(),
            id: rp_id.to_string(),
            origin: rp_origin.as_str().trim_end_matches('/').to_string(),
            allow_none_attestation: false,
        }
    }

    pub fn allow_none_attestation(mut self, allow: bool) -> Self {
        self.allow_none_attestation = allow;
        self
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `WEBAUTHN_RP_ID` - Relying Party ID (default: "localhost")
    /// - `WEBAUTHN_RP_ORIGIN` - RP origin URL (default: "http://localhost:3000")
    /// - `WEBAUTHN_RP_NAME` - RP display name (default: "WebAuthn Demo")
    /// - `WEBAUTHN_ALLOW_NONE_ATTESTATION` - accept "none" attestation (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let rp_id = lookup("WEBAUTHN_RP_ID").unwrap_or_else(|| "localhost".to_string());
        let rp_origin =
            lookup("WEBAUTHN_RP_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());
        let rp_name = lookup("WEBAUTHN_RP_NAME").unwrap_or_else(|| "WebAuthn Demo".to_string());
        let allow_none = lookup("WEBAUTHN_ALLOW_NONE_ATTESTATION")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        let origin =
            Url::parse(&rp_origin).map_err(|e| ConfigError::InvalidOrigin(format!("{}", e)))?;
        if origin.cannot_be_a_base() || origin.host_str().is_none() {
            return Err(ConfigError::InvalidOrigin(rp_origin));
        }

        Ok(Self::new(&rp_id, &origin, &rp_name).allow_none_attestation(allow_none))
    }
}

impl Default for RelyingParty {
    fn default() -> Self {
        Self {
            name: "WebAuthn Demo".to_string(),
            id: "localhost".to_string(),
            origin: "http://localhost:3000".to_string(),
            allow_none_attestation: false,
        }
    }
}
