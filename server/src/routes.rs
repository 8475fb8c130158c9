//! HTTP routes of the collector

use crate::store::LogStore;
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use habitat_shared::Record;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Records are tiny; anything larger is not a record
const MAX_BODY_BYTES: usize = 4 * 1024;

/// Build the collector router
pub fn router(store: Arc<LogStore>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sensor", post(ingest))
        .route("/sensor/{name}", get(latest))
        .route("/sensor/{name}/log", get(log))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(store)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

async fn ingest(State(store): State<Arc<LogStore>>, Json(record): Json<Record>) -> Response {
    if record.fields().next().is_none() {
        warn!("[INGEST] {}: record without measurements", record.sensor);
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "no measurements" })),
        )
            .into_response();
    }

    let time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    match store.append(&record, &time).await {
        Ok(slug) => {
            info!(
                "[INGEST] {} ({}): {} fields",
                record.sensor,
                slug,
                record.fields().count()
            );
            (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
        }
        Err(e) => {
            error!("[INGEST] {}: store failed: {}", record.sensor, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "store failed" })),
            )
                .into_response()
        }
    }
}

async fn latest(State(store): State<Arc<LogStore>>, Path(name): Path<String>) -> Response {
    match store.latest(&name).await {
        Ok(Some(row)) => {
            let mut body = Map::new();
            body.insert("time".into(), Value::from(row.time));
            body.insert("sensor".into(), Value::from(row.sensor));
            for (field, value) in row.fields {
                body.insert(field.wire_key().into(), Value::from(value));
            }
            (StatusCode::OK, Json(Value::Object(body))).into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "error": "no data" }))).into_response(),
        Err(e) => {
            error!("[QUERY] {}: {}", name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "read failed" })),
            )
                .into_response()
        }
    }
}

async fn log(State(store): State<Arc<LogStore>>, Path(name): Path<String>) -> Response {
    match store.raw(&name).await {
        Ok(Some(text)) => ([(header::CONTENT_TYPE, "text/plain")], text).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Log file not found").into_response(),
        Err(e) => {
            error!("[QUERY] {}: {}", name, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
