use rand::Rng;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fresco_server::api;
use fresco_server::config::ServerConfig;

/// Bind attempts on alternate high ports before giving up.
const BIND_RETRIES: u32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fresco_server=debug")),
        )
        .init();

    info!(
        "Starting fresco canvas server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    let state = api::build_state(&config)?;
    let router = api::build_router(state);

    let listener = bind_with_retry(config.port).await?;
    info!(addr = %listener.local_addr()?, "Listening for HTTP and channel connections");

    tokio::select! {
        result = axum::serve(listener, router) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server failed");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

/// Bind the configured port, falling back to a bounded number of random
/// high ports so a stale process on the default port does not wedge boots.
async fn bind_with_retry(port: u16) -> anyhow::Result<TcpListener> {
    match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => return Ok(listener),
        Err(e) => warn!(port, error = %e, "Bind failed, trying alternate high ports"),
    }

    for _ in 0..BIND_RETRIES {
        let alternate: u16 = rand::thread_rng().gen_range(20_000..60_000);
        match TcpListener::bind(("0.0.0.0", alternate)).await {
            Ok(listener) => {
                warn!(port = alternate, "Bound alternate high port");
                return Ok(listener);
            }
            Err(e) => warn!(port = alternate, error = %e, "Alternate bind failed"),
        }
    }

    anyhow::bail!("could not bind port {port} or any alternate after {BIND_RETRIES} retries")
}
