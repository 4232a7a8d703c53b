//! REST API over the stored datasets.
//!
//! `/health` is public; everything under `/v1` requires
//! `Authorization: Bearer <API_TOKEN>`.

pub mod auth;
pub mod error;
pub mod health;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::get,
};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use routes::{
    cars_handler, coe_handler, coe_latest_handler, latest_months_handler, months_handler,
    pqp_handler, root_handler, updated_handler,
};
use state::AppState;

pub fn router(state: Arc<AppState>, cors_origin: Option<&str>) -> Result<Router> {
    let allow_origin = match cors_origin {
        Some(origin) => AllowOrigin::exact(
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin '{origin}'"))?,
        ),
        None => {
            warn!("CORS_ORIGIN not set, allowing any origin");
            AllowOrigin::any()
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let v1 = Router::new()
        .route("/", get(root_handler))
        .route("/cars", get(cars_handler))
        .route("/coe", get(coe_handler))
        .route("/coe/latest", get(coe_latest_handler))
        .route("/coe/pqp", get(pqp_handler))
        .route("/months", get(months_handler))
        .route("/months/latest", get(latest_months_handler))
        .route("/updated/{task}", get(updated_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    Ok(Router::new()
        .route("/health", get(health::health_handler))
        .nest("/v1", v1)
        .layer(cors)
        .with_state(state))
}

pub async fn serve(state: Arc<AppState>, port: u16, cors_origin: Option<&str>) -> Result<()> {
    let app = router(state, cors_origin)?;

    let address = format!("0.0.0.0:{port}");
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DataStore;
    use crate::updater::UpdateLog;
    use std::env;

    #[test]
    fn test_router_rejects_invalid_origin() {
        let dir = env::temp_dir().join("coe_trends_router_origin");
        let store = Arc::new(DataStore::open(&dir).unwrap());
        let log = Arc::new(UpdateLog::load(dir.join("last_updated.json")).unwrap());
        let state = AppState::new(store, log, "token".to_string());

        assert!(router(state.clone(), Some("bad\norigin")).is_err());
        assert!(router(state, Some("https://example.com")).is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
