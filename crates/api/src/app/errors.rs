use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use tallyerp_accounting::ComposeError;
use tallyerp_core::DomainError;
use tallyerp_infra::{PostingError, ReadError, StoreError};

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
        }
    }
}

pub fn compose_error_to_response(err: ComposeError) -> Response {
    let message = err.to_string();
    match err {
        ComposeError::UnresolvedAccount { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "unresolved_account", message)
        }
        ComposeError::UnbalancedJournal { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "unbalanced_journal", message)
        }
        ComposeError::InvalidEvent(e) => domain_error_to_response(e),
    }
}

pub fn store_error_to_response(err: StoreError) -> Response {
    let message = err.to_string();
    match err {
        StoreError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        StoreError::UniqueViolation(_) | StoreError::InvalidState(_) => {
            json_error(StatusCode::CONFLICT, "conflict", message)
        }
        StoreError::Backend { retryable: true, .. } => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", message)
        }
        StoreError::Backend { retryable: false, .. } => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
        }
    }
}

pub fn posting_error_to_response(err: PostingError) -> Response {
    let message = err.to_string();
    match err {
        PostingError::Compose(e) => compose_error_to_response(e),
        PostingError::AlreadyPosted { .. } => json_error(StatusCode::CONFLICT, "already_posted", message),
        PostingError::SourceNotFound { .. } => {
            json_error(StatusCode::NOT_FOUND, "source_not_found", message)
        }
        PostingError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        PostingError::InvalidTransition(_) => {
            json_error(StatusCode::CONFLICT, "invalid_transition", message)
        }
        PostingError::PersistenceFailure { retryable: true, .. } => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "persistence_failure", message)
        }
        PostingError::PersistenceFailure { retryable: false, .. } => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "persistence_failure", message)
        }
    }
}

pub fn read_error_to_response(err: ReadError) -> Response {
    match err {
        ReadError::Store(e) => store_error_to_response(e),
        ReadError::Domain(e) => domain_error_to_response(e),
    }
}
