use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::TryStreamExt;
use uuid::Uuid;

use crate::dto::{CreateRouteOptions, RouteFilter, UpdateRouteOptions};
use crate::models::RoutePlan;
use crate::repositories::RouteStore;
use crate::state::AppState;
use crate::utils::errors::{not_found_error, RouteError};

pub fn create_route_router<S: RouteStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(list_routes::<S>).post(create_route::<S>))
        .route(
            "/:id",
            get(get_route::<S>).put(update_route::<S>).delete(delete_route::<S>),
        )
}

/// Cabecera Location de una ruta
pub(crate) fn route_location(id: Uuid) -> [(header::HeaderName, String); 1] {
    [(header::LOCATION, format!("/routes/{id}"))]
}

async fn list_routes<S: RouteStore>(
    State(state): State<AppState<S>>,
    Query(filter): Query<RouteFilter>,
) -> Result<Json<Vec<RoutePlan>>, RouteError> {
    let routes = state.manager.find(Some(filter)).try_collect().await?;
    Ok(Json(routes))
}

async fn get_route<S: RouteStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoutePlan>, RouteError> {
    let route = state
        .manager
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found_error(id))?;
    Ok(Json(route))
}

async fn create_route<S: RouteStore>(
    State(state): State<AppState<S>>,
    Json(options): Json<CreateRouteOptions>,
) -> Result<Response, RouteError> {
    let route = state.manager.create(options).await?;
    Ok((StatusCode::CREATED, route_location(route.id), Json(route)).into_response())
}

async fn update_route<S: RouteStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
    Json(options): Json<UpdateRouteOptions>,
) -> Result<Response, RouteError> {
    let route = state.manager.update(id, options).await?;
    Ok((StatusCode::ACCEPTED, route_location(route.id), Json(route)).into_response())
}

async fn delete_route<S: RouteStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<Uuid>,
) -> Result<Response, RouteError> {
    let deleted = state.manager.delete(&[id]).await?;
    if deleted == 0 {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(serde_json::json!({ "deleted": deleted })).into_response())
}
