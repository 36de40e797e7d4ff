//! Per-currency summaries for payees and organizers.
//!
//! The projection replays both aggregates from their events (sales and
//! buckets) and derives the summaries at query time, so every figure matches
//! what the write side would compute. Amounts are grouped by currency and
//! never summed across currencies.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use feeledger_commissions::{
    BucketEvent, BucketKey, CommissionBucket, CommissionStatus, LedgerBalance, LedgerEvent,
    SaleEvent, SaleFees, BUCKET_STREAM_TYPE, SALE_STREAM_TYPE,
};
use feeledger_core::{Aggregate, Currency, OrganizerId, PayeeId, SaleId, StreamId};
use feeledger_events::{CurrencySummary, EventEnvelope, OrganizerCurrencyTotals, Projection};

use crate::event_store::StoredEvent;

#[derive(Debug, Error)]
pub enum CurrencySummaryError {
    #[error("failed to deserialize ledger event: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number on {stream} (last={last}, found={found})")]
    NonMonotonicSequence { stream: StreamId, last: u64, found: u64 },

    #[error("read model lock poisoned")]
    Poisoned,
}

/// Read-side copy of every sale and bucket, rebuilt from events.
#[derive(Debug, Default)]
pub struct LedgerBook {
    sales: HashMap<SaleId, SaleFees>,
    buckets: HashMap<PayeeId, BTreeMap<Currency, CommissionBucket>>,
    cursors: HashMap<StreamId, u64>,
}

impl LedgerBook {
    pub fn cursor(&self, stream_id: &StreamId) -> u64 {
        self.cursors.get(stream_id).copied().unwrap_or(0)
    }

    /// One balance per currency the payee has a bucket in.
    pub fn payee_summary(&self, payee_id: PayeeId) -> CurrencySummary<LedgerBalance> {
        let mut summary = CurrencySummary::new(*payee_id.as_uuid());
        if let Some(buckets) = self.buckets.get(&payee_id) {
            for (currency, bucket) in buckets {
                summary.per_currency.insert(currency.clone(), bucket.balance());
            }
        }
        summary
    }

    pub fn organizer_summary(&self, organizer_id: OrganizerId) -> CurrencySummary<OrganizerCurrencyTotals> {
        let mut summary: CurrencySummary<OrganizerCurrencyTotals> =
            CurrencySummary::new(*organizer_id.as_uuid());

        for sale in self.sales.values() {
            if sale.organizer_id() != Some(organizer_id) {
                continue;
            }
            if let Some(fees) = sale.effective_fees() {
                let totals = summary.per_currency.entry(fees.currency.clone()).or_default();
                totals.gross_revenue += fees.subtotal;
            }
        }

        for entry in self.buckets.values().flat_map(|b| b.values()).flat_map(|b| b.entries()) {
            if entry.organizer_id != organizer_id {
                continue;
            }
            let totals = summary.per_currency.entry(entry.currency.clone()).or_default();
            match entry.status {
                CommissionStatus::Paid => totals.commissions_paid += entry.effective_amount(),
                CommissionStatus::Pending | CommissionStatus::Available => {
                    totals.commissions_unpaid += entry.effective_amount()
                }
                CommissionStatus::Reversed => {}
            }
        }

        summary
    }

    fn bucket_mut(&mut self, key: &BucketKey) -> &mut CommissionBucket {
        self.buckets
            .entry(key.payee_id)
            .or_default()
            .entry(key.currency.clone())
            .or_insert_with(|| CommissionBucket::empty(key.clone()))
    }
}

impl Projection for LedgerBook {
    type Ev = LedgerEvent;

    /// Envelopes at or below the stream's cursor were already applied.
    fn apply(&mut self, envelope: &EventEnvelope<LedgerEvent>) {
        let seq = envelope.sequence_number();
        if seq <= self.cursor(envelope.stream_id()) {
            return;
        }

        match envelope.payload() {
            LedgerEvent::Sale(ev) => {
                let sale_id = ev.sale_id();
                self.sales
                    .entry(sale_id)
                    .or_insert_with(|| SaleFees::empty(sale_id))
                    .apply(ev);
            }
            LedgerEvent::Bucket(ev) => {
                let key = ev.bucket().clone();
                self.bucket_mut(&key).apply(ev);
            }
        }

        self.cursors.insert(envelope.stream_id().clone(), seq);
    }
}

/// Decode a published envelope into a typed ledger event. Streams of other
/// types yield `None`.
pub fn decode(
    envelope: &EventEnvelope<JsonValue>,
) -> Result<Option<EventEnvelope<LedgerEvent>>, CurrencySummaryError> {
    let payload = envelope.payload().clone();
    let event = match envelope.stream_type() {
        SALE_STREAM_TYPE => LedgerEvent::Sale(
            serde_json::from_value::<SaleEvent>(payload)
                .map_err(|e| CurrencySummaryError::Deserialize(e.to_string()))?,
        ),
        BUCKET_STREAM_TYPE => LedgerEvent::Bucket(
            serde_json::from_value::<BucketEvent>(payload)
                .map_err(|e| CurrencySummaryError::Deserialize(e.to_string()))?,
        ),
        _ => return Ok(None),
    };

    Ok(Some(EventEnvelope::new(
        envelope.event_id(),
        envelope.stream_id().clone(),
        envelope.stream_type(),
        envelope.sequence_number(),
        event,
    )))
}

/// Currency aggregator read model, shared between the projection worker and
/// query handlers.
#[derive(Debug, Default)]
pub struct CurrencySummaryProjection {
    book: RwLock<LedgerBook>,
}

impl CurrencySummaryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one published envelope.
    ///
    /// Redelivered envelopes are skipped. A gap in a stream's sequence means
    /// an event was lost and is reported instead of being papered over.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), CurrencySummaryError> {
        let Some(typed) = decode(envelope)? else {
            return Ok(());
        };

        let mut book = self.book.write().map_err(|_| CurrencySummaryError::Poisoned)?;
        let last = book.cursor(typed.stream_id());
        let seq = typed.sequence_number();

        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 {
            return Err(CurrencySummaryError::NonMonotonicSequence {
                stream: typed.stream_id().clone(),
                last,
                found: seq,
            });
        }

        book.apply(&typed);
        Ok(())
    }

    /// Discard the read model and replay `events` (in commit order).
    pub fn rebuild(&self, events: &[StoredEvent]) -> Result<(), CurrencySummaryError> {
        {
            let mut book = self.book.write().map_err(|_| CurrencySummaryError::Poisoned)?;
            *book = LedgerBook::default();
        }
        for stored in events {
            self.apply_envelope(&stored.to_envelope())?;
        }
        Ok(())
    }

    pub fn payee_summary(&self, payee_id: PayeeId) -> Result<CurrencySummary<LedgerBalance>, CurrencySummaryError> {
        let book = self.book.read().map_err(|_| CurrencySummaryError::Poisoned)?;
        Ok(book.payee_summary(payee_id))
    }

    pub fn organizer_summary(
        &self,
        organizer_id: OrganizerId,
    ) -> Result<CurrencySummary<OrganizerCurrencyTotals>, CurrencySummaryError> {
        let book = self.book.read().map_err(|_| CurrencySummaryError::Poisoned)?;
        Ok(book.organizer_summary(organizer_id))
    }
}
