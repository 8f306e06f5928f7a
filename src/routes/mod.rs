//! Rutas HTTP
//!
//! Router de axum sobre el RouteManager, genérico en el almacén.

pub mod route_routes;
pub mod stop_routes;

use axum::{response::Json, routing::get, Router};
use serde_json::json;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::middleware::cors::cors_for_environment;
use crate::repositories::RouteStore;
use crate::state::AppState;

/// Router completo de la aplicación con sus capas
pub fn create_app_router<S: RouteStore>(state: AppState<S>) -> Router {
    let cors = cors_for_environment(&state.config);

    Router::new()
        .route("/health", get(health))
        .nest(
            "/routes",
            route_routes::create_route_router::<S>().merge(stop_routes::create_stop_router::<S>()),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
