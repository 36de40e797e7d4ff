//! Per-currency summaries served from the currency summary projection.
//!
//! The projection is updated off the write path, so a summary can trail the
//! ledger by the events still in flight on the bus.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use feeledger_core::{OrganizerId, PayeeId};

use crate::app::{errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/payees/:id", get(payee_summary))
        .route("/organizers/:id", get(organizer_summary))
}

pub async fn payee_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let payee_id: PayeeId = match errors::parse_path(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.summaries().payee_summary(payee_id) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::summary_error_to_response(e),
    }
}

pub async fn organizer_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let organizer_id: OrganizerId = match errors::parse_path(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.summaries().organizer_summary(organizer_id) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::summary_error_to_response(e),
    }
}
