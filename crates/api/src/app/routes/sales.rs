use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use feeledger_core::SaleId;
use feeledger_events::{SaleRecorded, SettlementReported};

use crate::app::{errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_sale))
        .route("/:id/fees", get(get_sale_fees))
        .route("/:id/settlement", post(report_settlement))
}

/// POST /sales - Assess fees and record the payee's pending commission
pub async fn record_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<SaleRecorded>,
) -> axum::response::Response {
    match services.ledger().record_sale(&body) {
        Ok(recorded) => (StatusCode::CREATED, Json(recorded)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// GET /sales/:id/fees - Stored breakdown net of refunds
pub async fn get_sale_fees(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let sale_id: SaleId = match errors::parse_path(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger().sale_fees(sale_id) {
        Ok(fees) => (StatusCode::OK, Json(fees)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// POST /sales/:id/settlement - The sale's funds settled; commission becomes available
pub async fn report_settlement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let sale_id: SaleId = match errors::parse_path(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger().mark_available(&SettlementReported { sale_id }) {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
