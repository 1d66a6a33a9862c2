//! OpenAPI documentation configuration

use utoipa::OpenApi;

use crate::handlers::{HealthResponse, ReadyResponse};
use crate::webauthn::{
    AttestationResponseBody, CeremonyParams, CredentialBody, ErrorResponse, MessageResponse,
    PubKeyCredParam, RegisterBody, RpEntity, UserEntity,
};

/// keyreg - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "keyreg - WebAuthn Registration API",
        version = "0.1.0",
        description = r#"
## WebAuthn credential registration

A two-step ceremony bound to a cookie session:

1. `POST /webauthn/register` reserves a username and returns a challenge
2. The browser passes the options to `navigator.credentials.create`
3. `POST /webauthn/response` validates and verifies the attestation, then
   stores the credential

Supported attestation formats: `packed` (self and x5c), `fido-u2f`, and
optionally `none`. Public keys must be ES256 (COSE alg -7).
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "WebAuthn", description = "Credential registration ceremony"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::webauthn::handlers::register,
        crate::webauthn::handlers::response,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            RegisterBody,
            CeremonyParams,
            RpEntity,
            UserEntity,
            PubKeyCredParam,
            CredentialBody,
            AttestationResponseBody,
            MessageResponse,
            ErrorResponse,
        )
    )
)]
pub struct ApiDoc;
