//! HTTP and WebSocket server for the restaurant order service.
//!
//! Provides REST endpoints for orders, vouchers and tables, a WebSocket
//! endpoint for real-time notifications, structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod demo;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use domain::OrderService;
use metrics_exporter_prometheus::PrometheusHandle;
use realtime::{RealtimeHub, TokenVerifier};
use store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<S>),
        )
        .route("/orders/{id}/served", patch(routes::orders::set_served::<S>))
        .route("/orders/{id}/approve", post(routes::orders::approve::<S>))
        .route("/orders/{id}/items", post(routes::orders::append_items::<S>))
        .route(
            "/orders/{id}/items/reject",
            post(routes::orders::reject_items::<S>),
        )
        .route(
            "/orders/{id}/items/{item_id}/status",
            patch(routes::orders::update_item_status::<S>),
        )
        .route("/orders/{id}/checkout", post(routes::orders::checkout::<S>))
        .route("/vouchers/validate", post(routes::vouchers::validate::<S>))
        .route("/tables", get(routes::tables::list::<S>))
        .route("/ws", get(routes::ws::upgrade::<S>))
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

/// Wires the order service, hub and token verifier around a store.
pub fn create_default_state<S: OrderStore + 'static>(store: S, config: &Config) -> Arc<AppState<S>> {
    let hub = RealtimeHub::new(config.realtime_channel_capacity);
    let orders = OrderService::new(store, hub.clone(), config.service_settings());

    Arc::new(AppState {
        orders,
        hub,
        tokens: TokenVerifier::new(config.jwt_secret()),
    })
}
