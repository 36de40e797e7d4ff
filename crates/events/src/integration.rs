//! Integration messages exchanged with the collaborators around the ledger.
//!
//! Consumed: sales, refunds, settlements and payout instructions from the
//! order/payment and operator collaborators. Served: per-bucket snapshots and
//! per-currency summaries for reporting.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use feeledger_core::{Currency, OrganizerId, PayeeId, PayoutId, Percentage, SaleId};

/// A completed checkout, reported by the order-processing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale_id: SaleId,
    pub currency: Currency,
    pub subtotal: Decimal,
    pub quantity: i64,
    pub country_code: String,
    pub provider_id: String,
    pub organizer_id: OrganizerId,
    #[serde(default)]
    pub payee_id: Option<PayeeId>,
    /// Falls back to the payee's default rate when absent.
    #[serde(default)]
    pub commission_rate: Option<Percentage>,
}

/// A refund, as the cumulative fraction of the original sale refunded so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundIssued {
    pub sale_id: SaleId,
    pub refunded_fraction: Decimal,
}

/// The sale's funds settled; its commission becomes eligible for payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReported {
    pub sale_id: SaleId,
}

/// Operator instruction to pay a payee out of one currency bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub payee_id: PayeeId,
    pub currency: Currency,
    pub amount: Decimal,
    pub requested_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The payment gateway could not deliver a previously recorded payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutFailed {
    pub payee_id: PayeeId,
    pub currency: Currency,
    pub payout_id: PayoutId,
}

/// Read-only fee quote; nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePreviewRequest {
    pub subtotal: Decimal,
    pub quantity: i64,
    pub country_code: String,
    pub provider_id: String,
    #[serde(default)]
    pub payee_id: Option<PayeeId>,
}

/// Balance of one `(payee, currency)` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub payee_id: PayeeId,
    pub currency: Currency,
    pub earned: Decimal,
    pub paid: Decimal,
    pub unpaid: Decimal,
    /// Settled commission a payout may still draw on.
    pub payable: Decimal,
    pub pending_count: u64,
    pub available_count: u64,
}

/// Organizer figures for a single currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizerCurrencyTotals {
    pub gross_revenue: Decimal,
    pub commissions_paid: Decimal,
    pub commissions_unpaid: Decimal,
}

/// Per-currency figures for one entity. There is deliberately no total field:
/// amounts in different currencies are never summed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySummary<T> {
    pub entity_id: Uuid,
    pub per_currency: BTreeMap<Currency, T>,
}

impl<T> CurrencySummary<T> {
    pub fn new(entity_id: Uuid) -> Self {
        Self {
            entity_id,
            per_currency: BTreeMap::new(),
        }
    }

    pub fn get(&self, currency: &Currency) -> Option<&T> {
        self.per_currency.get(currency)
    }
}
