//! Commission ledger domain module (event-sourced).
//!
//! Two aggregates:
//! - [`SaleFees`]: one stream per sale; the stored fee breakdown and how much
//!   of the sale has been refunded.
//! - [`CommissionBucket`]: one stream per `(payee, currency)`; commission
//!   entries, payouts and the balance derived from them. Every decision that
//!   reads a balance and writes against it happens inside this aggregate, so
//!   the stream revision is the concurrency boundary.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod balance;
pub mod bucket;
pub mod entry;
pub mod event;
pub mod payout;
pub mod sale;

pub use balance::LedgerBalance;
pub use bucket::{
    AdvanceEntry, BucketCommand, BucketEvent, BucketKey, CommissionBucket, CommissionRecorded,
    CommissionReduced, EntryAdvanced, FailPayout, PayoutMarkedFailed, PayoutRecorded,
    RecordCommission, RecordPayout, ReverseCommission, BUCKET_STREAM_TYPE,
};
pub use entry::{CommissionEntry, CommissionStatus};
pub use event::LedgerEvent;
pub use sale::ensure_refund_fraction;
pub use payout::{Payout, PayoutStatus};
pub use sale::{
    ApplyRefund, AssessSale, SaleAssessed, SaleCommand, SaleEvent, SaleFees, SaleFeesReduced,
    SALE_STREAM_TYPE,
};
