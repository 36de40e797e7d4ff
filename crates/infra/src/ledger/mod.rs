//! Ledger application service.
//!
//! Composes the pure fee calculator, the two aggregates and the command
//! dispatcher into the operations the outer surfaces call. Each write is a
//! read-modify-write on one or two streams; on an optimistic concurrency
//! conflict the whole operation is re-run from a fresh load, up to
//! `max_conflict_retries` times, before surfacing `LedgerError::Conflict`.

mod payouts;
mod recording;
mod reversal;

use serde_json::Value as JsonValue;
use tracing::warn;

use feeledger_commissions::{
    BucketCommand, BucketKey, CommissionBucket, SaleFees, BUCKET_STREAM_TYPE, SALE_STREAM_TYPE,
};
use feeledger_core::{Currency, LedgerError, LedgerResult, PayeeId, SaleId, StreamId};
use feeledger_events::{EventBus, EventEnvelope};
use feeledger_fees::PayeeProfile;

use crate::command_dispatcher::{CommandDispatcher, DispatchError, Loaded};
use crate::event_store::EventStore;
use crate::settings::FeeSettingsStore;

pub use recording::RecordedSale;
pub use reversal::ReversalOutcome;

#[derive(Debug)]
pub struct LedgerService<S, B, F> {
    dispatcher: CommandDispatcher<S, B>,
    settings: F,
    max_conflict_retries: u32,
}

impl<S, B, F> LedgerService<S, B, F> {
    pub fn new(dispatcher: CommandDispatcher<S, B>, settings: F, max_conflict_retries: u32) -> Self {
        Self {
            dispatcher,
            settings,
            max_conflict_retries,
        }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    pub fn settings(&self) -> &F {
        &self.settings
    }
}

impl<S, B, F> LedgerService<S, B, F>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    F: FeeSettingsStore,
{
    /// Run `attempt` until it succeeds, fails for a non-concurrency reason, or
    /// runs out of retries.
    fn with_retries<T>(
        &self,
        operation: &'static str,
        mut attempt: impl FnMut() -> Result<T, DispatchError>,
    ) -> LedgerResult<T> {
        let mut retries = 0;
        loop {
            match attempt() {
                Err(err) if err.is_concurrency() && retries < self.max_conflict_retries => {
                    retries += 1;
                    warn!(operation, retries, error = %err, "conflict; retrying from a fresh load");
                }
                Err(err) if err.is_concurrency() => {
                    warn!(operation, retries, error = %err, "conflict retries exhausted");
                    return Err(err.into());
                }
                other => return other.map_err(LedgerError::from),
            }
        }
    }

    fn load_sale(&self, sale_id: SaleId) -> Result<Loaded<SaleFees>, DispatchError> {
        self.dispatcher
            .load(StreamId::sale(sale_id), SALE_STREAM_TYPE, || SaleFees::empty(sale_id))
    }

    fn load_bucket(&self, key: &BucketKey) -> Result<Loaded<CommissionBucket>, DispatchError> {
        self.dispatcher
            .load(key.stream_id(), BUCKET_STREAM_TYPE, || CommissionBucket::empty(key.clone()))
    }

    /// Run one command against a bucket stream and return the bucket as
    /// committed.
    fn dispatch_bucket(&self, key: &BucketKey, command: BucketCommand) -> Result<CommissionBucket, DispatchError> {
        let (bucket, _) = self.dispatcher.dispatch(key.stream_id(), BUCKET_STREAM_TYPE, command, || {
            CommissionBucket::empty(key.clone())
        })?;
        Ok(bucket)
    }

    /// The sale, or `UnknownSale` if it was never recorded.
    fn existing_sale(&self, sale_id: SaleId) -> Result<Loaded<SaleFees>, DispatchError> {
        let loaded = self.load_sale(sale_id)?;
        if !loaded.aggregate.is_created() {
            return Err(LedgerError::UnknownSale(sale_id).into());
        }
        Ok(loaded)
    }

    fn registered_payee(&self, payee_id: PayeeId) -> LedgerResult<PayeeProfile> {
        self.settings
            .payee(payee_id)?
            .ok_or(LedgerError::UnknownPayee(payee_id))
    }

    /// Current state of a `(payee, currency)` bucket (empty if nothing was
    /// ever recorded in it).
    pub fn bucket(&self, payee_id: PayeeId, currency: &Currency) -> LedgerResult<CommissionBucket> {
        self.registered_payee(payee_id)?;
        let key = BucketKey::new(payee_id, currency.clone());
        Ok(self.load_bucket(&key)?.aggregate)
    }
}
