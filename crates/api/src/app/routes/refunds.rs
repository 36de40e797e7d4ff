use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use feeledger_events::RefundIssued;

use crate::app::{errors, services::AppServices};

pub fn router() -> Router {
    Router::new().route("/", post(issue_refund))
}

/// POST /refunds - Reduce the sale's fees and reverse its commission.
///
/// `refunded_fraction` is cumulative, so replaying a refund is a no-op
/// (`changed: false`).
pub async fn issue_refund(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RefundIssued>,
) -> axum::response::Response {
    match services.ledger().reverse(&body) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
