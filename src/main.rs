/// did-attest - DID ownership verification and attestation service
use did_attest::{config::ServerConfig, server, AppContext, AttestResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AttestResult<()> {
    // Loaded first so RUST_LOG from .env reaches the filter
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        debug_responses = config.service.debug_responses,
        signer = ?config.signer,
        "loaded configuration"
    );

    let ctx = AppContext::new(config)?;
    server::serve(ctx).await?;

    Ok(())
}
