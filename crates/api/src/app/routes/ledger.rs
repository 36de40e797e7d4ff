use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use feeledger_core::{Currency, PayeeId};

use crate::app::{errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/:payee/:currency", get(get_snapshot))
        .route("/:payee/:currency/entries", get(list_entries))
}

fn parse_bucket(payee: &str, currency: &str) -> Result<(PayeeId, Currency), axum::response::Response> {
    Ok((errors::parse_path(payee)?, errors::parse_path(currency)?))
}

/// GET /ledger/:payee/:currency - Earned, paid and unpaid for one currency
pub async fn get_snapshot(
    Extension(services): Extension<Arc<AppServices>>,
    Path((payee, currency)): Path<(String, String)>,
) -> axum::response::Response {
    let (payee_id, currency) = match parse_bucket(&payee, &currency) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger().snapshot(payee_id, &currency) {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// GET /ledger/:payee/:currency/entries - Commission entries and payouts
pub async fn list_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Path((payee, currency)): Path<(String, String)>,
) -> axum::response::Response {
    let (payee_id, currency) = match parse_bucket(&payee, &currency) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger().bucket(payee_id, &currency) {
        Ok(bucket) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "entries": bucket.entries(),
                "payouts": bucket.payouts(),
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
