//! Medtrack: a JSON-over-HTTP service for tracking a user's medications.
//!
//! Layers, outermost first:
//! - [`routes`]: axum handlers, typed extraction of bodies and queries.
//! - [`app`]: one use case per operation, each taking the pool explicitly.
//! - [`infra`]: SQLite connection and migrations.
//! - [`domain`]: dose schedule rules without I/O.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, Method},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use config::Config;
use error::AppError;
use infra::init_db;
use state::AppState;

/// Full application: routes, CORS and request tracing over shared state.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<(), AppError> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;

    info!("DB path: {:?}", config.db_path);
    let pool = init_db(&config.db_path).map_err(|e| {
        error!("DB init failed: {}", e);
        e
    })?;
    let state = AppState::new(pool);

    let address = config.address();
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| AppError::Server(format!("cannot bind {address}: {e}")))?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Server(e.to_string()))?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install terminate handler: {e}");
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
}
