//! Ledger error taxonomy.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::{PayeeId, PayoutId, SaleId};
use crate::money::Money;

/// Result type used across the domain layer.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Domain-level error.
///
/// Every variant is raised before any ledger mutation, so an `Err` always
/// means nothing was written. Infrastructure failures are folded into
/// `Conflict` (retryable) and `Storage`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed currency code, or two different currencies combined.
    #[error("invalid currency: {0}")]
    InvalidCurrency(String),

    /// A negative (or otherwise out-of-range) amount, quantity or fraction.
    #[error("invalid amount: {0}")]
    NegativeAmount(String),

    /// A service fee cap that is lower than the fee for a single ticket.
    #[error("service fee cap {cap} is below the minimum single-ticket fee {minimum}")]
    CapMisconfigured { cap: Decimal, minimum: Decimal },

    /// An identifier failed to parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("sale {0} was already recorded")]
    DuplicateSale(SaleId),

    #[error("invalid status transition: {0}")]
    InvalidTransition(String),

    /// The commission of this sale has already been disbursed; reversing it
    /// needs an explicit clawback decision that this ledger does not make.
    #[error("sale {0} has paid-out commission; reversal requires a clawback decision")]
    ReversalRequiresClawback(SaleId),

    #[error("payout exceeds payable balance of {unpaid}")]
    OverpayPayout { unpaid: Money },

    #[error("unknown payee {0}")]
    UnknownPayee(PayeeId),

    #[error("unknown sale {0}")]
    UnknownSale(SaleId),

    #[error("unknown payout {0}")]
    UnknownPayout(PayoutId),

    #[error("no fee configuration for country {0}")]
    UnknownCountry(String),

    #[error("no processing fee configured for provider {0}")]
    UnknownProvider(String),

    /// A concurrent writer won the race; the operation can be retried.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn invalid_currency(msg: impl Into<String>) -> Self {
        Self::InvalidCurrency(msg.into())
    }

    pub fn negative(msg: impl Into<String>) -> Self {
        Self::NegativeAmount(msg.into())
    }

    pub fn transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether retrying the same operation from a fresh read can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
