//! A fake runtime registration backend served over real HTTP.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use sitebox::{
    models::{CreateRuntimeRequest, UpdateRuntimeRequest},
    registry::{MemoryRegistry, RuntimeRegistry},
    SiteboxError,
};
use tokio::sync::Mutex;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Requests for this id always fail with an empty 500.
pub const BROKEN_ID: &str = "boom";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub registry: MemoryRegistry,
    pub authorizations: Arc<Mutex<Vec<Option<String>>>>,
    pub update_bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(rename = "projectId")]
    project_id: String,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Starts the backend on an ephemeral port and returns it with its API base URL.
pub async fn start_backend() -> (FakeBackend, String) {
    let backend = FakeBackend::default();
    let app = Router::new()
        .route("/api/webcontainers", post(create).get(list))
        .route(
            "/api/webcontainers/{id}",
            get(fetch).put(update).delete(remove),
        )
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (backend, format!("http://127.0.0.1:{}/api", port))
}

async fn record_auth(backend: &FakeBackend, headers: &HeaderMap) {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    backend.authorizations.lock().await.push(value);
}

fn error_response(error: SiteboxError) -> Response {
    let status = error
        .status()
        .and_then(|status| StatusCode::from_u16(status).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, error.to_string()).into_response()
}

async fn create(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(request): Json<CreateRuntimeRequest>,
) -> Response {
    record_auth(&backend, &headers).await;
    match backend.registry.create(&request).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn update(
    State(backend): State<FakeBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    record_auth(&backend, &headers).await;
    backend.update_bodies.lock().await.push(body.clone());

    let request: UpdateRuntimeRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(e) => return (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    };

    match backend.registry.update(&id, &request).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

async fn fetch(
    State(backend): State<FakeBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    record_auth(&backend, &headers).await;
    if id == BROKEN_ID {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match backend.registry.get(&id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "not found").into_response(),
        Err(e) => error_response(e),
    }
}

async fn list(
    State(backend): State<FakeBackend>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Response {
    record_auth(&backend, &headers).await;
    match backend.registry.list_by_project(&query.project_id).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(e),
    }
}

async fn remove(
    State(backend): State<FakeBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    record_auth(&backend, &headers).await;
    match backend.registry.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}
