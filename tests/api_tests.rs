use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use route_manager::config::EnvironmentConfig;
use route_manager::repositories::{FaultPoint, MemoryRouteStore, StoreError};
use route_manager::routes::create_app_router;
use route_manager::state::AppState;

#[tokio::test]
async fn test_health_check() {
    let (app, _) = create_test_app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "route_manager");
}

#[tokio::test]
async fn test_create_route_returns_created_with_location() {
    let (app, _) = create_test_app();
    let request = json_request(
        Method::POST,
        "/routes",
        json!({
            "name": "Lyon Nord",
            "dispatch_time": "2025-03-01T06:00:00Z",
            "metadata": { "depot": "LYS-01" },
            "stops": [{ "sequence": 1, "name": "Bellecour", "time_window_begin": "2025-03-01T08:00:00Z" }]
        }),
    );
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let body = read_json(response).await;
    assert_eq!(location, format!("/routes/{}", body["id"].as_str().unwrap()));
    assert_eq!(body["name"], "Lyon Nord");
    assert_eq!(body["stops"][0]["latitude"], Value::Null);
    assert_eq!(body["metadata"][0]["key"], "depot");

    let (status, fetched) = send(&app, Method::GET, &location, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, body);
}

#[tokio::test]
async fn test_invalid_name_is_bad_request() {
    let (app, _) = create_test_app();
    let (status, body) = send(&app, Method::POST, "/routes", Some(json!({ "name": "x".repeat(51) }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");
    assert_eq!(body["details"]["field"], "name");
}

#[tokio::test]
async fn test_duplicate_metadata_keys_are_rejected() {
    let (app, _) = create_test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/routes",
        Some(json!({ "metadata": { "Zone": "1", "zone": "2" } })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_list_routes_with_filter() {
    let (app, _) = create_test_app();
    for name in ["Food Lyon", "food Paris", "Parcels"] {
        send(&app, Method::POST, "/routes", Some(json!({ "name": name }))).await;
    }

    let (status, body) = send(&app, Method::GET, "/routes?name=FOOD&limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    let routes = body.as_array().unwrap();
    assert_eq!(routes.len(), 2);
    assert!(routes
        .iter()
        .all(|route| route["name"].as_str().unwrap().to_lowercase().contains("food")));
}

#[tokio::test]
async fn test_zero_limit_is_bad_request() {
    let (app, _) = create_test_app();
    let (status, body) = send(&app, Method::GET, "/routes?limit=0", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "limit");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = create_test_app();
    let path = format!("/routes/{}", uuid::Uuid::new_v4());

    let (status, body) = send(&app, Method::GET, &path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(&app, Method::PUT, &path, Some(json!({ "name": "R" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_route_is_accepted() {
    let (app, _) = create_test_app();
    let (_, created) = send(&app, Method::POST, "/routes", Some(json!({ "name": "Before" }))).await;
    let path = format!("/routes/{}", created["id"].as_str().unwrap());

    let response = app
        .clone()
        .oneshot(json_request(Method::PUT, &path, json!({ "name": "After" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers()[header::LOCATION], path.as_str());
    assert_eq!(read_json(response).await["name"], "After");
}

#[tokio::test]
async fn test_stop_endpoints() {
    let (app, _) = create_test_app();
    let (_, created) = send(&app, Method::POST, "/routes", Some(json!({ "name": "Stops" }))).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &app,
        Method::POST,
        &format!("/routes/{id}/stops"),
        Some(json!({
            "sequence": 3,
            "latitude": 45.76,
            "longitude": 4.83,
            "time_window_begin": "2025-03-01T08:00:00Z",
            "time_window_end": "2025-03-01T09:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let stop_id = updated["stops"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(updated["stops"][0]["latitude"], 45.76);

    let (status, updated) = send(&app, Method::DELETE, &format!("/routes/{id}/stops/{stop_id}"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(updated["stops"], json!([]));
}

#[tokio::test]
async fn test_inverted_time_window_is_bad_request() {
    let (app, _) = create_test_app();
    let (_, created) = send(&app, Method::POST, "/routes", Some(json!({ "name": "Window" }))).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/routes/{id}/stops"),
        Some(json!({
            "sequence": 1,
            "time_window_begin": "2025-03-01T09:00:00Z",
            "time_window_end": "2025-03-01T08:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "add_stops[0].time_window_end");
}

#[tokio::test]
async fn test_delete_route_then_no_content() {
    let (app, store) = create_test_app();
    let (_, created) = send(&app, Method::POST, "/routes", Some(json!({ "name": "Gone" }))).await;
    let path = format!("/routes/{}", created["id"].as_str().unwrap());

    let (status, body) = send(&app, Method::DELETE, &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);
    assert_eq!(store.row_counts().await.routes, 0);

    let response = app
        .clone()
        .oneshot(Request::builder().method(Method::DELETE).uri(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_write_conflict_is_409() {
    let (app, store) = create_test_app();
    let (_, created) = send(&app, Method::POST, "/routes", Some(json!({ "name": "Busy" }))).await;
    let path = format!("/routes/{}", created["id"].as_str().unwrap());

    store.fail_next(FaultPoint::Commit, StoreError::WriteConflict("serialization failure".into()));
    let (status, body) = send(&app, Method::PUT, &path, Some(json!({ "name": "Busier" }))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "WRITE_CONFLICT");
}

#[tokio::test]
async fn test_store_outage_is_503() {
    let (app, store) = create_test_app();
    store.fail_next(FaultPoint::Query, StoreError::Unavailable("connection refused".into()));

    let (status, body) = send(&app, Method::GET, "/routes", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "STORE_UNAVAILABLE");
}

#[tokio::test]
async fn test_cors_is_open_only_in_development() {
    let preflight = || {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/routes")
            .header(header::ORIGIN, "http://planner.test")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap()
    };

    let (development, _) = create_test_app();
    let response = development.oneshot(preflight()).await.unwrap();
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

    let mut config = EnvironmentConfig::default();
    config.environment = "production".into();
    let production = create_app_router(AppState::new(MemoryRouteStore::new(), config.clone()));
    let response = production.oneshot(preflight()).await.unwrap();
    assert!(!response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

    config.cors_origins = vec!["http://planner.test".into()];
    let configured = create_app_router(AppState::new(MemoryRouteStore::new(), config));
    let response = configured.oneshot(preflight()).await.unwrap();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://planner.test");
}

fn create_test_app() -> (Router, MemoryRouteStore) {
    let store = MemoryRouteStore::new();
    let app = create_app_router(AppState::new(store.clone(), EnvironmentConfig::default()));
    (app, store)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => json_request(method, uri, body),
        None => Request::builder().method(method).uri(uri).body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, read_json(response).await)
}
