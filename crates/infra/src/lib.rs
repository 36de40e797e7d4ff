//! Infrastructure layer: event store, dispatcher, fee settings, projections
//! and the ledger service that ties them together.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod ledger;
pub mod projections;
pub mod settings;
pub mod workers;

mod integration_tests;

pub use config::{ConfigError, LedgerConfig};
pub use ledger::{LedgerService, RecordedSale, ReversalOutcome};
