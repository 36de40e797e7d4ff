use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use feeledger_core::{Currency, PayeeId, PayoutId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Completed,
    Failed,
}

/// Immutable record of money sent to a payee. Only `status` may change, and
/// only from `completed` to `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub payout_id: PayoutId,
    pub payee_id: PayeeId,
    pub currency: Currency,
    pub amount: Decimal,
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub requested_by: String,
    pub notes: Option<String>,
}

impl Payout {
    pub fn is_completed(&self) -> bool {
        self.status == PayoutStatus::Completed
    }
}
