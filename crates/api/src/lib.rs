//! HTTP API server for order management.
//!
//! Provides REST endpoints for the product catalog, order placement and the
//! order lifecycle, with bearer-token authentication, structured logging
//! (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, put};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::TokenVerifier;
use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/api/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route(
            "/api/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route("/api/orders/{id}", get(routes::orders::get::<S>))
        .route("/api/orders/{id}/cancel", put(routes::orders::cancel::<S>))
        .route(
            "/api/orders/{id}/status",
            put(routes::orders::update_status::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store`, verifying access tokens
/// with `jwt_secret`.
pub fn create_state<S: OrderStore + Clone + 'static>(store: S, jwt_secret: &str) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, TokenVerifier::new(jwt_secret)))
}
