//! `(payee, currency)` commission bucket.
//!
//! Entries and payouts of one payee in one currency live in a single stream.
//! Every check that reads the balance (overpay, clawback) is made by `handle`
//! against the state loaded at the stream revision that the append will
//! assert, so two writers can never both spend the same `unpaid`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use feeledger_core::{
    Aggregate, AggregateRoot, Currency, EntryId, LedgerError, Money, OrganizerId, PayeeId,
    PayoutId, Percentage, SaleId, StreamId,
};
use feeledger_events::Event;

use crate::balance::LedgerBalance;
use crate::entry::{CommissionEntry, CommissionStatus};
use crate::payout::{Payout, PayoutStatus};
use crate::sale::ensure_refund_fraction;

pub const BUCKET_STREAM_TYPE: &str = "commissions.bucket";

/// Identity of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub payee_id: PayeeId,
    pub currency: Currency,
}

impl BucketKey {
    pub fn new(payee_id: PayeeId, currency: Currency) -> Self {
        Self { payee_id, currency }
    }

    pub fn stream_id(&self) -> StreamId {
        StreamId::bucket(self.payee_id, &self.currency)
    }
}

/// Aggregate root: CommissionBucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionBucket {
    key: BucketKey,
    /// In recording order; payout allocation walks this front to back.
    entries: Vec<CommissionEntry>,
    payouts: Vec<Payout>,
    version: u64,
}

impl CommissionBucket {
    pub fn empty(key: BucketKey) -> Self {
        Self {
            key,
            entries: Vec::new(),
            payouts: Vec::new(),
            version: 0,
        }
    }

    pub fn key(&self) -> &BucketKey {
        &self.key
    }

    pub fn entries(&self) -> &[CommissionEntry] {
        &self.entries
    }

    pub fn payouts(&self) -> &[Payout] {
        &self.payouts
    }

    pub fn entry(&self, entry_id: EntryId) -> Option<&CommissionEntry> {
        self.entries.iter().find(|e| e.entry_id == entry_id)
    }

    pub fn payout(&self, payout_id: PayoutId) -> Option<&Payout> {
        self.payouts.iter().find(|p| p.payout_id == payout_id)
    }

    pub fn balance(&self) -> LedgerBalance {
        LedgerBalance::derive(
            self.key.payee_id,
            self.key.currency.clone(),
            &self.entries,
            &self.payouts,
        )
    }

    /// Completed payout money not yet matched to a `paid` entry.
    fn unallocated(&self) -> Decimal {
        let balance = self.balance();
        let settled: Decimal = self
            .entries
            .iter()
            .filter(|e| e.status == CommissionStatus::Paid)
            .map(CommissionEntry::effective_amount)
            .sum();
        (balance.paid - settled).max(Decimal::ZERO)
    }

    fn entry_mut(&mut self, entry_id: EntryId) -> Option<&mut CommissionEntry> {
        self.entries.iter_mut().find(|e| e.entry_id == entry_id)
    }
}

impl AggregateRoot for CommissionBucket {
    type Id = BucketKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordCommission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCommission {
    pub sale_id: SaleId,
    pub organizer_id: OrganizerId,
    pub currency: Currency,
    pub subtotal: Decimal,
    pub commission_rate: Percentage,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdvanceEntry. Only `pending → available` is reachable this way;
/// `paid` and `reversed` belong to payouts and reversals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceEntry {
    pub entry_id: EntryId,
    pub to: CommissionStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseCommission (cumulative fraction of the sale refunded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseCommission {
    pub sale_id: SaleId,
    pub refunded_fraction: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayout {
    pub payout_id: PayoutId,
    pub amount: Decimal,
    pub requested_by: String,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FailPayout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailPayout {
    pub payout_id: PayoutId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketCommand {
    RecordCommission(RecordCommission),
    AdvanceEntry(AdvanceEntry),
    ReverseCommission(ReverseCommission),
    RecordPayout(RecordPayout),
    FailPayout(FailPayout),
}

/// Event: CommissionRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRecorded {
    pub bucket: BucketKey,
    pub entry_id: EntryId,
    pub sale_id: SaleId,
    pub organizer_id: OrganizerId,
    pub commission_amount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryAdvanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAdvanced {
    pub bucket: BucketKey,
    pub entry_id: EntryId,
    pub from: CommissionStatus,
    pub to: CommissionStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CommissionReduced.
///
/// `reversed_amount` is cumulative; `reduction` is what this event removed
/// from the entry's effective amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionReduced {
    pub bucket: BucketKey,
    pub entry_id: EntryId,
    pub refunded_fraction: Decimal,
    pub reduction: Decimal,
    pub reversed_amount: Decimal,
    pub status: CommissionStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PayoutRecorded, with the entries it settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRecorded {
    pub bucket: BucketKey,
    pub payout_id: PayoutId,
    pub amount: Decimal,
    pub requested_by: String,
    pub notes: Option<String>,
    pub settled_entries: Vec<EntryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PayoutMarkedFailed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutMarkedFailed {
    pub bucket: BucketKey,
    pub payout_id: PayoutId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketEvent {
    CommissionRecorded(CommissionRecorded),
    EntryAdvanced(EntryAdvanced),
    CommissionReduced(CommissionReduced),
    PayoutRecorded(PayoutRecorded),
    PayoutMarkedFailed(PayoutMarkedFailed),
}

impl BucketEvent {
    pub fn bucket(&self) -> &BucketKey {
        match self {
            BucketEvent::CommissionRecorded(e) => &e.bucket,
            BucketEvent::EntryAdvanced(e) => &e.bucket,
            BucketEvent::CommissionReduced(e) => &e.bucket,
            BucketEvent::PayoutRecorded(e) => &e.bucket,
            BucketEvent::PayoutMarkedFailed(e) => &e.bucket,
        }
    }
}

impl Event for BucketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BucketEvent::CommissionRecorded(_) => "commissions.bucket.commission_recorded",
            BucketEvent::EntryAdvanced(_) => "commissions.bucket.entry_advanced",
            BucketEvent::CommissionReduced(_) => "commissions.bucket.commission_reduced",
            BucketEvent::PayoutRecorded(_) => "commissions.bucket.payout_recorded",
            BucketEvent::PayoutMarkedFailed(_) => "commissions.bucket.payout_failed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BucketEvent::CommissionRecorded(e) => e.occurred_at,
            BucketEvent::EntryAdvanced(e) => e.occurred_at,
            BucketEvent::CommissionReduced(e) => e.occurred_at,
            BucketEvent::PayoutRecorded(e) => e.occurred_at,
            BucketEvent::PayoutMarkedFailed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CommissionBucket {
    type Command = BucketCommand;
    type Event = BucketEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BucketEvent::CommissionRecorded(e) => {
                self.key = e.bucket.clone();
                self.entries.push(CommissionEntry {
                    entry_id: e.entry_id,
                    sale_id: e.sale_id,
                    payee_id: e.bucket.payee_id,
                    organizer_id: e.organizer_id,
                    currency: e.bucket.currency.clone(),
                    commission_amount: e.commission_amount,
                    reversed_amount: Decimal::ZERO,
                    refunded_fraction: Decimal::ZERO,
                    status: CommissionStatus::Pending,
                    recorded_at: e.occurred_at,
                });
            }
            BucketEvent::EntryAdvanced(e) => {
                if let Some(entry) = self.entry_mut(e.entry_id) {
                    entry.status = e.to;
                }
            }
            BucketEvent::CommissionReduced(e) => {
                if let Some(entry) = self.entry_mut(e.entry_id) {
                    entry.refunded_fraction = e.refunded_fraction;
                    entry.reversed_amount = e.reversed_amount;
                    entry.status = e.status;
                }
            }
            BucketEvent::PayoutRecorded(e) => {
                self.payouts.push(Payout {
                    payout_id: e.payout_id,
                    payee_id: e.bucket.payee_id,
                    currency: e.bucket.currency.clone(),
                    amount: e.amount,
                    status: PayoutStatus::Completed,
                    created_at: e.occurred_at,
                    requested_by: e.requested_by.clone(),
                    notes: e.notes.clone(),
                });
                for entry_id in &e.settled_entries {
                    if let Some(entry) = self.entry_mut(*entry_id) {
                        entry.status = CommissionStatus::Paid;
                    }
                }
            }
            BucketEvent::PayoutMarkedFailed(e) => {
                if let Some(payout) = self.payouts.iter_mut().find(|p| p.payout_id == e.payout_id) {
                    payout.status = PayoutStatus::Failed;
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BucketCommand::RecordCommission(cmd) => self.handle_record(cmd),
            BucketCommand::AdvanceEntry(cmd) => self.handle_advance(cmd),
            BucketCommand::ReverseCommission(cmd) => self.handle_reverse(cmd),
            BucketCommand::RecordPayout(cmd) => self.handle_payout(cmd),
            BucketCommand::FailPayout(cmd) => self.handle_fail_payout(cmd),
        }
    }
}

impl CommissionBucket {
    fn handle_record(&self, cmd: &RecordCommission) -> Result<Vec<BucketEvent>, LedgerError> {
        if cmd.currency != self.key.currency {
            return Err(LedgerError::invalid_currency(format!(
                "sale in {} cannot be recorded in the {} bucket",
                cmd.currency, self.key.currency
            )));
        }
        if cmd.subtotal < Decimal::ZERO {
            return Err(LedgerError::negative("subtotal must not be negative"));
        }
        let entry_id = EntryId::from(cmd.sale_id);
        if self.entry(entry_id).is_some() {
            return Err(LedgerError::DuplicateSale(cmd.sale_id));
        }

        Ok(vec![BucketEvent::CommissionRecorded(CommissionRecorded {
            bucket: self.key.clone(),
            entry_id,
            sale_id: cmd.sale_id,
            organizer_id: cmd.organizer_id,
            commission_amount: CommissionEntry::commission_for(
                cmd.subtotal,
                cmd.commission_rate,
                &self.key.currency,
            ),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_advance(&self, cmd: &AdvanceEntry) -> Result<Vec<BucketEvent>, LedgerError> {
        let entry = self
            .entry(cmd.entry_id)
            .ok_or_else(|| LedgerError::UnknownSale(cmd.entry_id.sale_id()))?;

        entry.status.ensure_transition(cmd.to)?;
        if cmd.to != CommissionStatus::Available {
            return Err(LedgerError::transition(format!(
                "{:?} is only reachable through a payout or a reversal",
                cmd.to
            )));
        }

        Ok(vec![BucketEvent::EntryAdvanced(EntryAdvanced {
            bucket: self.key.clone(),
            entry_id: cmd.entry_id,
            from: entry.status,
            to: cmd.to,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse(&self, cmd: &ReverseCommission) -> Result<Vec<BucketEvent>, LedgerError> {
        ensure_refund_fraction(cmd.refunded_fraction)?;
        let entry = self
            .entry(EntryId::from(cmd.sale_id))
            .ok_or(LedgerError::UnknownSale(cmd.sale_id))?;

        if entry.status == CommissionStatus::Reversed
            || cmd.refunded_fraction <= entry.refunded_fraction
        {
            return Ok(Vec::new());
        }
        if entry.status == CommissionStatus::Paid {
            return Err(LedgerError::ReversalRequiresClawback(cmd.sale_id));
        }

        let full = cmd.refunded_fraction == Decimal::ONE;
        let reversed_amount = if full {
            entry.commission_amount
        } else {
            self.key
                .currency
                .round(entry.commission_amount * cmd.refunded_fraction)
        };
        let reduction = reversed_amount - entry.reversed_amount;

        // Payouts are backed by settled entries only, so shrinking a settled
        // entry must leave enough settled commission to cover them.
        if entry.status != CommissionStatus::Pending && reduction > self.balance().payable {
            return Err(LedgerError::ReversalRequiresClawback(cmd.sale_id));
        }

        let status = if full {
            CommissionStatus::Reversed
        } else {
            entry.status
        };
        if status != entry.status {
            entry.status.ensure_transition(status)?;
        }

        Ok(vec![BucketEvent::CommissionReduced(CommissionReduced {
            bucket: self.key.clone(),
            entry_id: entry.entry_id,
            refunded_fraction: cmd.refunded_fraction,
            reduction,
            reversed_amount,
            status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_payout(&self, cmd: &RecordPayout) -> Result<Vec<BucketEvent>, LedgerError> {
        if cmd.amount <= Decimal::ZERO {
            return Err(LedgerError::negative("payout amount must be positive"));
        }
        if self.payout(cmd.payout_id).is_some() {
            return Err(LedgerError::conflict(format!(
                "payout {} already recorded",
                cmd.payout_id
            )));
        }

        let payable = self.balance().payable;
        if cmd.amount > payable {
            return Err(LedgerError::OverpayPayout {
                unpaid: Money::new(payable, self.key.currency.clone()),
            });
        }

        let mut unallocated = self.unallocated() + cmd.amount;
        let mut settled_entries = Vec::new();
        for entry in self
            .entries
            .iter()
            .filter(|e| e.status == CommissionStatus::Available)
        {
            let owed = entry.effective_amount();
            if owed > unallocated {
                break;
            }
            unallocated -= owed;
            settled_entries.push(entry.entry_id);
        }

        Ok(vec![BucketEvent::PayoutRecorded(PayoutRecorded {
            bucket: self.key.clone(),
            payout_id: cmd.payout_id,
            amount: cmd.amount,
            requested_by: cmd.requested_by.clone(),
            notes: cmd.notes.clone(),
            settled_entries,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fail_payout(&self, cmd: &FailPayout) -> Result<Vec<BucketEvent>, LedgerError> {
        let payout = self
            .payout(cmd.payout_id)
            .ok_or(LedgerError::UnknownPayout(cmd.payout_id))?;
        if payout.status != PayoutStatus::Completed {
            return Err(LedgerError::transition(format!(
                "payout {} is already failed",
                cmd.payout_id
            )));
        }

        Ok(vec![BucketEvent::PayoutMarkedFailed(PayoutMarkedFailed {
            bucket: self.key.clone(),
            payout_id: cmd.payout_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
