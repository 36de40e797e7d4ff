//! Ledger events: the `Event` contract, stream envelopes, the pub/sub bus that
//! carries committed events to read models, and the integration messages
//! exchanged with the order, refund, payout and reporting collaborators.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod integration;
pub mod projection;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use integration::{
    CurrencySummary, FeePreviewRequest, LedgerSnapshot, OrganizerCurrencyTotals, PayoutFailed,
    PayoutRequest, RefundIssued, SaleRecorded, SettlementReported,
};
pub use projection::Projection;
