//! `feeledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! money and currency value objects, typed identifiers, the ledger error
//! taxonomy and the aggregate contract shared by the ledger modules.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{LedgerError, LedgerResult};
pub use id::{EntryId, OrganizerId, PayeeId, PayoutId, SaleId, StreamId};
pub use money::{Currency, Money, Percentage};
pub use value_object::ValueObject;
