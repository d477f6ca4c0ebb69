//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection, chart loading, poster and reader wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use tallyerp_infra::{Settings, StoreError};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the router over already-wired services.
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}

/// Wire services from settings and build the router (entrypoint used by `main.rs`).
pub async fn build_app_from_settings(settings: &Settings) -> Result<Router, StoreError> {
    let services = services::build_services(settings).await?;
    Ok(build_app(Arc::new(services)))
}
