//! keyreg server - WebAuthn registration ceremony over HTTP
//!
//! - POST /webauthn/register - start a ceremony for a username
//! - POST /webauthn/response - submit the authenticator's credential

use keyreg_server::{create_router_with_config, AppState, Config, RelyingParty};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,keyreg_server=debug")),
        )
        .init();

    let config = Config::from_env();
    let rp = RelyingParty::from_env()?;
    tracing::info!(
        rp_id = %rp.id,
        origin = %rp.origin,
        allow_none_attestation = rp.allow_none_attestation,
        "Relying party configured"
    );

    let state = AppState::from_config(&config, rp).await?;
    let app = create_router_with_config(&config, state);

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("keyreg server listening on http://{}", addr);
    tracing::info!("API docs at http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
