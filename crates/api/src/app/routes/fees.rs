//! Fee quotes. Nothing here writes to the ledger.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use feeledger_events::FeePreviewRequest;

use crate::app::{errors, services::AppServices};

#[derive(Debug, Deserialize)]
pub struct DonationFeeRequest {
    pub country_code: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct TransferFeeRequest {
    pub country_code: String,
    pub original_price: Decimal,
}

pub fn router() -> Router {
    Router::new()
        .route("/preview", post(preview))
        .route("/donation", post(donation))
        .route("/transfer", post(transfer))
}

/// POST /fees/preview - Price a checkout with the same calculator sales use
pub async fn preview(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<FeePreviewRequest>,
) -> axum::response::Response {
    match services.ledger().fee_preview(&body) {
        Ok(fees) => (StatusCode::OK, Json(fees)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn donation(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<DonationFeeRequest>,
) -> axum::response::Response {
    match services.ledger().donation_fee(&body.country_code, body.amount) {
        Ok(fees) => (StatusCode::OK, Json(fees)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<TransferFeeRequest>,
) -> axum::response::Response {
    match services.ledger().transfer_fee(&body.country_code, body.original_price) {
        Ok(fees) => (StatusCode::OK, Json(fees)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
