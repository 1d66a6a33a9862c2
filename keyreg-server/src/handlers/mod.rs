//! HTTP request handlers
//!
//! Service-level endpoints. The ceremony endpoints live in
//! [`crate::webauthn::handlers`].

pub mod health;

pub use health::{health, ready, HealthResponse, ReadyResponse};
