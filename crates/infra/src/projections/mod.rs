//! Projection implementations (read model builders).
//!
//! Projections consume committed ledger events and build query-optimized read
//! models. They are rebuildable from the store and idempotent under
//! at-least-once delivery.

pub mod currency_summary;

pub use currency_summary::{CurrencySummaryError, CurrencySummaryProjection, LedgerBook};
