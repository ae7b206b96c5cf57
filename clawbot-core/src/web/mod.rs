// clawbot-core/src/web/mod.rs
//
// axum router for the webhook, the controller play route and the read-only
// dashboards.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use axum_server::{Handle, Server};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::Error;
use crate::eventbus::EventBus;
use crate::ingestion::EventIngestion;
use crate::services::GameService;

pub use error::ApiError;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<EventIngestion>,
    pub game: Arc<GameService>,
    pub event_bus: Arc<EventBus>,
    /// Expected bearer token for `POST /play/{user_id}`.
    pub controller_token: Arc<str>,
}

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/webhook", post(handlers::webhook))
        .route("/queue/status", get(handlers::queue_status))
        .route("/queue/dashboard", get(handlers::queue_dashboard))
        .route("/prizes/inventory", get(handlers::prizes_inventory))
        .route("/prizes/dashboard", get(handlers::prizes_dashboard))
        .route("/prizes/available", get(handlers::prizes_available))
        .route("/play/{user_id}", post(handlers::play))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// Serves `app` on `addr` until `shutdown_rx` flips to true, then drains
/// in-flight requests for up to `grace`.
pub async fn serve(
    addr: SocketAddr,
    app: Router,
    mut shutdown_rx: watch::Receiver<bool>,
    grace: Duration,
) -> Result<(), Error> {
    let handle = Handle::new();
    let handle_clone = handle.clone();

    tokio::spawn(async move {
        while !*shutdown_rx.borrow() {
            if shutdown_rx.changed().await.is_err() {
                break;
            }
        }
        handle_clone.graceful_shutdown(Some(grace));
    });

    info!("HTTP server listening on http://{}", addr);
    Server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;
    info!("HTTP server shut down.");
    Ok(())
}
