use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use feeledger_core::LedgerError;
use feeledger_infra::projections::CurrencySummaryError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        LedgerError::InvalidCurrency(_) => json_error(StatusCode::BAD_REQUEST, "invalid_currency", message),
        LedgerError::NegativeAmount(_) => json_error(StatusCode::BAD_REQUEST, "invalid_amount", message),
        LedgerError::CapMisconfigured { .. } => {
            json_error(StatusCode::BAD_REQUEST, "cap_misconfigured", message)
        }
        LedgerError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        LedgerError::UnknownPayee(_) => json_error(StatusCode::NOT_FOUND, "unknown_payee", message),
        LedgerError::UnknownSale(_) => json_error(StatusCode::NOT_FOUND, "unknown_sale", message),
        LedgerError::UnknownPayout(_) => json_error(StatusCode::NOT_FOUND, "unknown_payout", message),
        LedgerError::UnknownCountry(_) => json_error(StatusCode::NOT_FOUND, "unknown_country", message),
        LedgerError::UnknownProvider(_) => json_error(StatusCode::NOT_FOUND, "unknown_provider", message),
        LedgerError::DuplicateSale(_) => json_error(StatusCode::CONFLICT, "duplicate_sale", message),
        LedgerError::InvalidTransition(_) => json_error(StatusCode::CONFLICT, "invalid_transition", message),
        LedgerError::ReversalRequiresClawback(_) => {
            json_error(StatusCode::CONFLICT, "reversal_requires_clawback", message)
        }
        LedgerError::OverpayPayout { unpaid } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "overpay",
                "message": message,
                "unpaid": unpaid,
            })),
        )
            .into_response(),
        LedgerError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        LedgerError::Storage(_) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message),
    }
}

pub fn summary_error_to_response(err: CurrencySummaryError) -> axum::response::Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "projection_error", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path segment (ids, currency codes) into its domain type.
pub fn parse_path<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = LedgerError>,
{
    raw.parse::<T>().map_err(ledger_error_to_response)
}
