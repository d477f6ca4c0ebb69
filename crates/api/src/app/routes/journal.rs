use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use tallyerp_accounting::{BusinessEvent, SourceType};
use tallyerp_core::JournalEntryId;

use crate::app::dto::{EntryResponse, VoidRequest};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/compose", post(compose))
        .route("/post", post(post_entry))
        .route("/:id", get(get_entry))
        .route("/:id/void", post(void_entry))
        .route("/sources/:source_type/:source_id", get(source_status))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", e.body_text()))
}

fn entry_id(raw: &str) -> Result<JournalEntryId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

/// Dry run: the lines an event would post, without persisting anything.
pub async fn compose(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<BusinessEvent>, JsonRejection>,
) -> axum::response::Response {
    let event = match body(payload) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    match services.compose(&event) {
        Ok(composed) => (StatusCode::OK, Json(composed)).into_response(),
        Err(e) => errors::posting_error_to_response(e),
    }
}

pub async fn post_entry(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<BusinessEvent>, JsonRejection>,
) -> axum::response::Response {
    let event = match body(payload) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    match services.post(&event).await {
        Ok(entry) => (StatusCode::CREATED, Json(EntryResponse::from(entry))).into_response(),
        Err(e) => errors::posting_error_to_response(e),
    }
}

pub async fn get_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match entry_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.entry(id).await {
        Ok(Some(entry)) => (StatusCode::OK, Json(EntryResponse::from(entry))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("journal entry {id}")),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn void_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<VoidRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match entry_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let req = match body(payload) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match services.void(id, &req.reason).await {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(e) => errors::posting_error_to_response(e),
    }
}

pub async fn source_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path((source_type, source_id)): Path<(String, String)>,
) -> axum::response::Response {
    let source_type = match SourceType::parse(&source_type) {
        Ok(t) => t,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.source_status(source_type, &source_id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => errors::posting_error_to_response(e),
    }
}
