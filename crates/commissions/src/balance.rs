use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use feeledger_core::{Currency, PayeeId};
use feeledger_events::LedgerSnapshot;

use crate::entry::{CommissionEntry, CommissionStatus};
use crate::payout::Payout;

/// Balance of one `(payee, currency)` bucket, always derived from its entries
/// and payouts, never stored on its own.
///
/// - `earned`: effective commission of every non-reversed entry
/// - `paid`: amount of every completed payout
/// - `unpaid`: `earned - paid`, never negative
/// - `payable`: settled commission (`available` or `paid` entries) not yet
///   covered by a completed payout; pending commission is never payable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerBalance {
    pub payee_id: PayeeId,
    pub currency: Currency,
    pub earned: Decimal,
    pub paid: Decimal,
    pub unpaid: Decimal,
    pub payable: Decimal,
    pub pending_count: u64,
    pub available_count: u64,
    pub paid_count: u64,
    pub reversed_count: u64,
}

impl LedgerBalance {
    pub fn derive(
        payee_id: PayeeId,
        currency: Currency,
        entries: &[CommissionEntry],
        payouts: &[Payout],
    ) -> Self {
        let mut balance = Self {
            payee_id,
            currency,
            earned: Decimal::ZERO,
            paid: Decimal::ZERO,
            unpaid: Decimal::ZERO,
            payable: Decimal::ZERO,
            pending_count: 0,
            available_count: 0,
            paid_count: 0,
            reversed_count: 0,
        };

        let mut settled = Decimal::ZERO;
        for entry in entries {
            if entry.counts_as_earned() {
                balance.earned += entry.effective_amount();
            }
            if matches!(
                entry.status,
                CommissionStatus::Available | CommissionStatus::Paid
            ) {
                settled += entry.effective_amount();
            }
            match entry.status {
                CommissionStatus::Pending => balance.pending_count += 1,
                CommissionStatus::Available => balance.available_count += 1,
                CommissionStatus::Paid => balance.paid_count += 1,
                CommissionStatus::Reversed => balance.reversed_count += 1,
            }
        }

        balance.paid = payouts
            .iter()
            .filter(|p| p.is_completed())
            .map(|p| p.amount)
            .sum();
        balance.unpaid = balance.earned - balance.paid;
        balance.payable = (settled - balance.paid)
            .min(balance.unpaid)
            .max(Decimal::ZERO);
        balance
    }

    pub fn to_snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            payee_id: self.payee_id,
            currency: self.currency.clone(),
            earned: self.earned,
            paid: self.paid,
            unpaid: self.unpaid,
            payable: self.payable,
            pending_count: self.pending_count,
            available_count: self.available_count,
        }
    }
}
