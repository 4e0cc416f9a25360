//! `nutrisnap-server` - In-memory mock backend for nutrisnap.
//!
//! Serves account signup and login plus whole-state nutrition sync over
//! JSON. All routes share one [`AppState`]; nothing is persisted.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod error;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use nutrisnap::api::routes;
use tokio::net::TcpListener;
use tracing::info;

pub use error::ApiError;
pub use state::AppState;

/// Build the router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(routes::SIGNUP, post(handlers::signup))
        .route(routes::LOGIN, post(handlers::login))
        .route(routes::PROFILE, post(handlers::profile))
        .route(routes::NUTRITION_SYNC, post(handlers::sync_nutrition))
        .route(routes::NUTRITION_GET, post(handlers::get_nutrition))
        .route(routes::HEALTH, get(handlers::health))
        .with_state(state)
}

/// Serve a fresh backend on an already bound listener until the task is
/// cancelled.
///
/// # Errors
///
/// Returns an error if the server fails to accept connections.
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("nutrisnapd listening on http://{}", addr);
    }
    axum::serve(listener, router(AppState::new())).await
}
