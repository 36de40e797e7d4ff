use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use feeledger_core::{Currency, EntryId, LedgerError, LedgerResult, OrganizerId, PayeeId, Percentage, SaleId};

/// Commission entry lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Available,
    Paid,
    Reversed,
}

impl CommissionStatus {
    /// `pending → available → paid`, and `{pending, available} → reversed`.
    pub fn can_transition_to(self, next: CommissionStatus) -> bool {
        use CommissionStatus::*;
        matches!(
            (self, next),
            (Pending, Available) | (Available, Paid) | (Pending, Reversed) | (Available, Reversed)
        )
    }

    pub fn ensure_transition(self, next: CommissionStatus) -> LedgerResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(LedgerError::transition(format!("{self:?} -> {next:?}")))
        }
    }
}

/// Commission owed to a payee for one sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionEntry {
    pub entry_id: EntryId,
    pub sale_id: SaleId,
    pub payee_id: PayeeId,
    pub organizer_id: OrganizerId,
    pub currency: Currency,
    /// Commission at sale time, rounded to minor units. Never changes.
    pub commission_amount: Decimal,
    /// Cumulative amount reversed by refunds.
    pub reversed_amount: Decimal,
    /// Cumulative fraction of the sale refunded so far.
    pub refunded_fraction: Decimal,
    pub status: CommissionStatus,
    pub recorded_at: DateTime<Utc>,
}

impl CommissionEntry {
    /// `round(subtotal × rate)` in the sale's currency.
    pub fn commission_for(subtotal: Decimal, rate: Percentage, currency: &Currency) -> Decimal {
        currency.round(rate.of(subtotal))
    }

    /// Commission still owed after partial reversals.
    pub fn effective_amount(&self) -> Decimal {
        self.commission_amount - self.reversed_amount
    }

    /// Whether this entry contributes to `earned`.
    pub fn counts_as_earned(&self) -> bool {
        self.status != CommissionStatus::Reversed
    }
}
