//! Admin routes for fee settings.
//!
//! Saved settings apply to sales recorded afterwards; stored breakdowns and
//! commission entries are never recomputed.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::put,
    Json, Router,
};
use serde::Deserialize;

use feeledger_core::{PayeeId, Percentage};
use feeledger_fees::{CountryFeeConfig, PayeeFeeOverride, PayeeProfile};

use crate::app::{errors, services::AppServices};

#[derive(Debug, Deserialize)]
pub struct SavePayeeRequest {
    pub display_name: String,
    pub default_commission_rate: Percentage,
    pub fee_override: Option<PayeeFeeOverride>,
}

pub fn router() -> Router {
    Router::new()
        .route("/countries/:code", put(save_country).get(get_country))
        .route("/payees/:id", put(save_payee).get(get_payee))
}

/// PUT /admin/countries/:code - Replace a country's fee table
pub async fn save_country(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
    Json(body): Json<CountryFeeConfig>,
) -> axum::response::Response {
    if !body.country_code.trim().eq_ignore_ascii_case(code.trim()) {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "country_mismatch",
            format!("body is for {} but path is {}", body.country_code, code),
        );
    }

    match services.ledger().save_country(body.clone()) {
        Ok(()) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_country(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
) -> axum::response::Response {
    match services.ledger().country(&code) {
        Ok(config) => (StatusCode::OK, Json(config)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// PUT /admin/payees/:id - Register or update a payee
pub async fn save_payee(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<SavePayeeRequest>,
) -> axum::response::Response {
    let payee_id: PayeeId = match errors::parse_path(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let profile = PayeeProfile {
        payee_id,
        display_name: body.display_name,
        default_commission_rate: body.default_commission_rate,
        fee_override: body.fee_override,
    };
    match services.ledger().save_payee(profile.clone()) {
        Ok(()) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_payee(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let payee_id: PayeeId = match errors::parse_path(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger().payee(payee_id) {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
