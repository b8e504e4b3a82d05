//! zkbridge server
//!
//! Serves the HTTP API for one terminal until SIGINT/SIGTERM, then leaves
//! real-time mode and disconnects so the device is never left streaming.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use zkbridge::api::{self, AppState};
use zkbridge::client::ZkConnector;
use zkbridge::config::BridgeConfig;
use zkbridge::{DeviceSession, LogObserver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zkbridge=info,tower_http=info".into()),
        )
        .init();

    let config = BridgeConfig::from_env().context("invalid configuration")?;

    info!("Starting zkbridge (env: {})", config.environment);
    if config.api_key.is_none() {
        warn!("API_KEY is not set, /api routes are open to anyone who can reach this port");
    }
    match &config.device_ip {
        Some(ip) => info!(
            "Default device {}:{} via {}",
            ip, config.device_port, config.device_protocol
        ),
        None => info!("No DEVICE_IP set, connect requests must name the device"),
    }

    let connector = Arc::new(ZkConnector::new(config.device_protocol, config.device_password));
    let session = Arc::new(
        DeviceSession::new(connector, config.session_defaults()).with_observer(Arc::new(LogObserver)),
    );

    let state = AppState::new(session.clone(), config.api_key.clone(), &config.environment);
    let app = api::create_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("ZKTeco Bridge Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("HTTP server stopped, releasing device");
    if let Err(e) = session.disconnect().await {
        warn!("Failed to disconnect from device on shutdown: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
