//! Refundly realtime gateway binary.
//!
//! Entry point for the WebSocket gateway and its internal HTTP endpoints.

use anyhow::Context;
use refundly_api::{validator_from_config, AppState, Server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,refundly_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("invalid gateway configuration")?;
    let validator =
        validator_from_config(&config).context("failed to set up session validation")?;
    let state = AppState::from_config(&config, validator);

    tracing::info!(
        addr = %config.addr(),
        outbound_buffer = config.outbound_buffer,
        ingestion_key = config.internal_key.is_some(),
        "starting Refundly realtime gateway"
    );

    Server::new(config, state)
        .run()
        .await
        .context("gateway server failed")?;

    Ok(())
}
