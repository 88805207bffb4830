//! HTTP API server for the canteen ordering backend.
//!
//! Exposes the menu, basket and order endpoints over axum, with structured
//! logging (tracing) and Prometheus metrics. The caller identity comes from
//! headers set by the upstream gateway.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{BasketService, MenuService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
///
/// Every service holds its own clone of the same store handle.
pub struct AppState<S: Store> {
    pub store: S,
    pub orders: OrderService<S>,
    pub baskets: BasketService<S>,
    pub menu: MenuService<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/menu",
            get(routes::menu::list::<S>).post(routes::menu::create::<S>),
        )
        .route(
            "/menu/{item_id}",
            axum::routing::patch(routes::menu::update::<S>).delete(routes::menu::delete::<S>),
        )
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route(
            "/orders/{order_id}",
            get(routes::orders::get::<S>)
                .patch(routes::orders::update_status::<S>)
                .delete(routes::orders::delete::<S>),
        )
        .route(
            "/basket",
            get(routes::basket::get::<S>)
                .post(routes::basket::add::<S>)
                .delete(routes::basket::clear::<S>),
        )
        .route("/basket/checkout", post(routes::basket::checkout::<S>))
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

/// Creates the application state, wiring every service to `store`.
pub fn create_default_state<S: Store>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        orders: OrderService::new(store.clone()),
        baskets: BasketService::new(store.clone()),
        menu: MenuService::new(store.clone()),
        store,
    })
}
