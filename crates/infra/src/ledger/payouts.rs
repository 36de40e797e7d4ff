use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, instrument, warn};

use feeledger_commissions::{BucketCommand, BucketKey, FailPayout, Payout, RecordPayout};
use feeledger_core::{LedgerError, LedgerResult, PayoutId};
use feeledger_events::{EventBus, EventEnvelope, PayoutFailed, PayoutRequest};

use super::LedgerService;
use crate::event_store::EventStore;
use crate::settings::FeeSettingsStore;

impl<S, B, F> LedgerService<S, B, F>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    F: FeeSettingsStore,
{
    /// Record a completed payout, checked against the bucket's `payable` as of
    /// the revision the payout is appended at.
    #[instrument(skip(self, request), fields(payee_id = %request.payee_id, currency = %request.currency, amount = %request.amount))]
    pub fn request_payout(&self, request: &PayoutRequest) -> LedgerResult<Payout> {
        self.registered_payee(request.payee_id)?;
        let key = BucketKey::new(request.payee_id, request.currency.clone());
        let payout_id = PayoutId::new();

        let result = self.with_retries("request_payout", || {
            let bucket = self.dispatch_bucket(
                &key,
                BucketCommand::RecordPayout(RecordPayout {
                    payout_id,
                    amount: request.amount,
                    requested_by: request.requested_by.clone(),
                    notes: request.notes.clone(),
                    occurred_at: Utc::now(),
                }),
            )?;

            bucket
                .payout(payout_id)
                .cloned()
                .ok_or_else(|| LedgerError::UnknownPayout(payout_id).into())
        });

        match &result {
            Ok(payout) => info!(payout_id = %payout.payout_id, "payout recorded"),
            Err(LedgerError::OverpayPayout { unpaid }) => warn!(%unpaid, "payout rejected: exceeds payable"),
            Err(err) => warn!(error = %err, "payout rejected"),
        }
        result
    }

    /// The gateway could not deliver a payout; its amount counts as unpaid again.
    #[instrument(skip(self, failure), fields(payout_id = %failure.payout_id, payee_id = %failure.payee_id))]
    pub fn fail_payout(&self, failure: &PayoutFailed) -> LedgerResult<Payout> {
        self.registered_payee(failure.payee_id)?;
        let key = BucketKey::new(failure.payee_id, failure.currency.clone());

        let payout = self.with_retries("fail_payout", || {
            let bucket = self.dispatch_bucket(
                &key,
                BucketCommand::FailPayout(FailPayout {
                    payout_id: failure.payout_id,
                    occurred_at: Utc::now(),
                }),
            )?;

            bucket
                .payout(failure.payout_id)
                .cloned()
                .ok_or_else(|| LedgerError::UnknownPayout(failure.payout_id).into())
        })?;

        info!(amount = %payout.amount, "payout marked failed");
        Ok(payout)
    }
}
