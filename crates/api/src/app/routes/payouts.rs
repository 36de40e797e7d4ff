use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use feeledger_core::{Currency, PayeeId, PayoutId};
use feeledger_events::{PayoutFailed, PayoutRequest};

use crate::app::{errors, services::AppServices};

#[derive(Debug, Deserialize)]
pub struct PayoutFailureRequest {
    pub payee_id: PayeeId,
    pub currency: Currency,
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(request_payout))
        .route("/:id/failure", post(report_failure))
}

/// POST /payouts - Record a disbursement against the unpaid balance
pub async fn request_payout(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<PayoutRequest>,
) -> axum::response::Response {
    match services.ledger().request_payout(&body) {
        Ok(payout) => (StatusCode::CREATED, Json(payout)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// POST /payouts/:id/failure - The disbursement bounced
pub async fn report_failure(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<PayoutFailureRequest>,
) -> axum::response::Response {
    let payout_id: PayoutId = match errors::parse_path(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let failure = PayoutFailed {
        payee_id: body.payee_id,
        currency: body.currency,
        payout_id,
    };
    match services.ledger().fail_payout(&failure) {
        Ok(payout) => (StatusCode::OK, Json(payout)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
