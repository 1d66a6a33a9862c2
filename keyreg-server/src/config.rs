//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.
//! Relying Party settings live in [`crate::webauthn::RelyingParty`].

use std::net::SocketAddr;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in KB (default: 64)
    pub body_limit_kb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Pending challenge lifetime in seconds; 0 leaves it to the session (default: 300)
    pub challenge_ttl_secs: u64,
    /// Session inactivity expiry in hours (default: 24)
    pub session_ttl_hours: i64,
    /// Mark the session cookie `Secure` (default: false)
    pub session_secure_cookie: bool,
    /// PostgreSQL URL; in-memory storage when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 10)
    pub database_max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_kb: 64,
            timeout_secs: 30,
            challenge_ttl_secs: 300,
            session_ttl_hours: 24,
            session_secure_cookie: false,
            database_url: None,
            database_max_connections: 10,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let host = lookup("HOST")
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = lookup("ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let body_limit_kb = lookup("BODY_LIMIT_KB")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.body_limit_kb);

        let timeout_secs = lookup("REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        let challenge_ttl_secs = lookup("CHALLENGE_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.challenge_ttl_secs);

        let session_ttl_hours = lookup("SESSION_TTL_HOURS")
            .and_then(|v| v.parse().ok())
            .filter(|h: &i64| *h > 0)
            .unwrap_or(defaults.session_ttl_hours);

        let session_secure_cookie = lookup("SESSION_SECURE_COOKIE")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(defaults.session_secure_cookie);

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());

        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.database_max_connections);

        Self {
            port,
            host,
            allowed_origins,
            body_limit_kb,
            timeout_secs,
            challenge_ttl_secs,
            session_ttl_hours,
            session_secure_cookie,
            database_url,
            database_max_connections,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Explicit challenge lifetime, if any
    pub fn challenge_ttl(&self) -> Option<chrono::Duration> {
        match self.challenge_ttl_secs {
            0 => None,
            secs => i64::try_from(secs).ok().map(chrono::Duration::seconds),
        }
    }
}
