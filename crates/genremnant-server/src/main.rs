mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use genremnant_api::{AppState, AppStateInner};
use genremnant_db::Database;
use genremnant_gateway::NotificationHub;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "genremnant=debug,genremnant_api=debug,genremnant_gateway=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Database::connect(&config.backend)
        .await
        .context("failed to open database")?;
    info!("Database ready ({})", db.backend_name());

    // Shared state
    let hub = NotificationHub::new();
    let state: AppState = Arc::new(AppStateInner {
        db,
        hub: hub.clone(),
        jwt_secret: config.jwt_secret.clone(),
        admin_email: config.admin_email.clone(),
    });

    let app = genremnant_api::router(state)
        .layer(cors_layer(&config.cors_origins)?)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("GenRemnant server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await?;

    info!("Server stopped");
    Ok(())
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin '{}'", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true))
}

/// Resolves on Ctrl-C or SIGTERM, after closing every open socket.
async fn shutdown_signal(hub: NotificationHub) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, closing WebSocket connections");
    hub.close_all().await;
}
