use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, post},
    Json, Router,
};
use uuid::Uuid;

use crate::dto::{StopOptions, UpdateRouteOptions};
use crate::repositories::RouteStore;
use crate::routes::route_routes::route_location;
use crate::state::AppState;
use crate::utils::errors::RouteError;

// Atajos sobre update para las paradas de una ruta
pub fn create_stop_router<S: RouteStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/:id/stops", post(add_stop::<S>))
        .route("/:id/stops/:stop_id", delete(remove_stop::<S>))
}

async fn add_stop<S: RouteStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
    Json(stop): Json<StopOptions>,
) -> Result<Response, RouteError> {
    let route = state
        .manager
        .update(id, UpdateRouteOptions::default().add_stop(stop))
        .await?;
    Ok((StatusCode::ACCEPTED, route_location(route.id), Json(route)).into_response())
}

async fn remove_stop<S: RouteStore>(
    State(state): State<AppState<S>>,
    Path((id, stop_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, RouteError> {
    let route = state
        .manager
        .update(id, UpdateRouteOptions::default().remove_stop(stop_id))
        .await?;
    Ok((StatusCode::ACCEPTED, route_location(route.id), Json(route)).into_response())
}
