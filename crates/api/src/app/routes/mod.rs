use axum::{routing::get, Router};

pub mod accounts;
pub mod journal;
pub mod ledger;
pub mod reports;
pub mod system;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/accounts", get(accounts::list_accounts))
        .nest("/journal", journal::router())
        .nest("/ledger", ledger::router())
        .nest("/reports", reports::router())
}
