//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::{routing::get, Router};

use crate::store::LedgerStore;

pub use routes::{create_router, AppState};

/// Build the full application: health check plus the ledger routes wrapped
/// in the context and logging middleware.
///
/// Axum layers run in reverse order of addition, so the context is attached
/// before the logging middleware reads it.
pub fn build_app<S>(state: AppState<S>) -> Router
where
    S: LedgerStore + Clone + 'static,
{
    let api_routes = create_router::<S>()
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(axum::middleware::from_fn(middleware::context_middleware));

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
