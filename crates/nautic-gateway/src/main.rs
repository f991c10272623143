//! Nautic HTTP/JSON Gateway binary.

use clap::Parser;
use nautic_gateway::vision::unlinked_loader;
use nautic_gateway::{create_router, AppState, Args, GatewayConfig};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "nautic_gateway=info,nautic_core=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    // Parse command line args
    let args = Args::parse();
    let config = GatewayConfig::from(&args);

    info!(
        listen = %config.listen_addr,
        algorithm = ?config.auth.algorithm,
        token_ttl_secs = config.auth.token_ttl.as_secs(),
        model = %config.model_path.display(),
        policy = ?config.failure_policy,
        "Starting Nautic Gateway"
    );

    if config.secret_generated {
        warn!("no secret key configured, using a generated one; tokens will not survive a restart");
    }

    let state = AppState::new(config.clone(), unlinked_loader())?;
    for status in state.registry.status() {
        info!(capability = status.name, probe = status.probe, "capability registered");
    }

    if config.preload {
        info!("Preloading capabilities");
        let _ = state.registry.warm_up();
    }

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Gateway listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
