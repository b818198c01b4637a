//! HTTP and WebSocket routes.

mod routes;

use axum::{routing::get, Router};
use shared::Channel;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::relay::Hub;

/// Shared app state.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route(Channel::Poller.path(), get(routes::poller_ws))
        .route(Channel::Printers.path(), get(routes::printers_ws))
        // Displays from before the channel split connect to the root.
        .route("/", get(routes::printers_ws))
        .route(Channel::Sign.path(), get(routes::sign_ws))
        .route(Channel::Hours.path(), get(routes::hours_ws))
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
