use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, instrument, warn};

use feeledger_commissions::{
    ensure_refund_fraction, ApplyRefund, BucketCommand, CommissionEntry, ReverseCommission,
    SaleCommand,
};
use feeledger_core::{EntryId, LedgerError, LedgerResult};
use feeledger_events::{EventBus, EventEnvelope, RefundIssued};
use feeledger_fees::FeeBreakdown;

use super::LedgerService;
use crate::event_store::EventStore;
use crate::settings::FeeSettingsStore;

/// State of a sale after a refund was processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalOutcome {
    /// Fees retained after the refund.
    pub fees: FeeBreakdown,
    pub commission: Option<CommissionEntry>,
    /// False when the refund had already been applied.
    pub changed: bool,
}

impl<S, B, F> LedgerService<S, B, F>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    F: FeeSettingsStore,
{
    /// Apply a refund to a sale's stored fees and its commission entry.
    ///
    /// `refunded_fraction` is cumulative, so a redelivered or out-of-order
    /// refund that is not larger than what was already applied changes nothing.
    #[instrument(skip(self, refund), fields(sale_id = %refund.sale_id, fraction = %refund.refunded_fraction))]
    pub fn reverse(&self, refund: &RefundIssued) -> LedgerResult<ReversalOutcome> {
        ensure_refund_fraction(refund.refunded_fraction)?;

        let outcome = self.with_retries("reverse", || {
            let now = Utc::now();
            let mut sale = self.existing_sale(refund.sale_id)?;
            let reduced = sale.decide(&SaleCommand::ApplyRefund(ApplyRefund {
                sale_id: refund.sale_id,
                refunded_fraction: refund.refunded_fraction,
                occurred_at: now,
            }))?;

            let fees = sale
                .aggregate
                .effective_fees()
                .ok_or(LedgerError::UnknownSale(refund.sale_id))?;

            let Some(key) = self.sale_bucket(&sale.aggregate) else {
                let changed = reduced.is_some();
                self.dispatcher().commit([reduced])?;
                return Ok(ReversalOutcome {
                    fees,
                    commission: None,
                    changed,
                });
            };

            let mut bucket = self.load_bucket(&key)?;
            let reversed = bucket.decide(&BucketCommand::ReverseCommission(ReverseCommission {
                sale_id: refund.sale_id,
                refunded_fraction: refund.refunded_fraction,
                occurred_at: now,
            }))?;

            let changed = reduced.is_some() || reversed.is_some();
            self.dispatcher().commit([reduced, reversed])?;
            Ok(ReversalOutcome {
                fees,
                commission: bucket.aggregate.entry(EntryId::from(refund.sale_id)).cloned(),
                changed,
            })
        });

        match &outcome {
            Ok(o) if o.changed => info!(total_fee = %o.fees.total_fee, "refund applied"),
            Ok(_) => info!("refund already applied"),
            Err(LedgerError::ReversalRequiresClawback(_)) => {
                warn!("refund touches commission that was already paid out")
            }
            Err(_) => {}
        }
        outcome
    }
}
