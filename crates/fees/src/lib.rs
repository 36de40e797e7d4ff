//! Fee module: country/payee fee configuration and the pure fee calculator.
//!
//! Every surface that shows or charges a fee (checkout, previews, refunds,
//! reports) goes through [`FeeCalculator`], so there is a single formula.
//! No IO, no shared state.

pub mod calculator;
pub mod config;

pub use calculator::{FeeBreakdown, FeeCalculator, SaleContext};
pub use config::{CountryFeeConfig, PayeeFeeOverride, PayeeProfile, ProviderFee, ResolvedFeeConfig};
