//! The fee formula.
//!
//! Checkout path:
//!
//! ```text
//! uncapped    = subtotal × percentage + fixed_per_ticket × quantity
//! service     = min(uncapped, cap)                  (when a cap is set)
//! processing  = (subtotal + service) × provider.% + provider.fixed + fixed_per_order
//! total_fee   = service + processing
//! grand_total = subtotal + total_fee
//! ```
//!
//! Processing is charged on the post-service-fee total, so the buyer's total
//! carries the provider's real pass-through cost. Donation and transfer fees are
//! separate operations on their own base amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use feeledger_core::{Currency, LedgerError, LedgerResult, ValueObject};

use crate::config::ResolvedFeeConfig;

/// What is being priced at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleContext {
    pub subtotal: Decimal,
    pub quantity: i64,
    pub provider_id: String,
}

/// Fee breakdown of one sale (or one donation / transfer).
///
/// Components are rounded to the currency's minor units, and the totals are
/// sums of the rounded components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub currency: Currency,
    pub subtotal: Decimal,
    pub service_fee: Decimal,
    pub processing_fee: Decimal,
    pub donation_fee: Decimal,
    pub transfer_fee: Decimal,
    pub total_fee: Decimal,
    pub grand_total: Decimal,
}

impl ValueObject for FeeBreakdown {}

impl FeeBreakdown {
    fn from_parts(
        currency: Currency,
        subtotal: Decimal,
        service_fee: Decimal,
        processing_fee: Decimal,
        donation_fee: Decimal,
        transfer_fee: Decimal,
    ) -> Self {
        let total_fee = service_fee + processing_fee + donation_fee + transfer_fee;
        Self {
            currency,
            subtotal,
            service_fee,
            processing_fee,
            donation_fee,
            transfer_fee,
            total_fee,
            grand_total: subtotal + total_fee,
        }
    }

    /// The breakdown that remains once `refunded_fraction` of the sale has
    /// been refunded. Fees are not kept on refunded amounts.
    pub fn retained(&self, refunded_fraction: Decimal) -> LedgerResult<Self> {
        if refunded_fraction < Decimal::ZERO || refunded_fraction > Decimal::ONE {
            return Err(LedgerError::negative(format!(
                "refunded fraction {refunded_fraction} is outside [0, 1]"
            )));
        }
        let keep = Decimal::ONE - refunded_fraction;
        let c = &self.currency;
        Ok(Self::from_parts(
            c.clone(),
            c.round(self.subtotal * keep),
            c.round(self.service_fee * keep),
            c.round(self.processing_fee * keep),
            c.round(self.donation_fee * keep),
            c.round(self.transfer_fee * keep),
        ))
    }
}

/// Stateless, side-effect free fee calculator.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeeCalculator;

impl FeeCalculator {
    /// Price a paid-ticket checkout.
    pub fn checkout(config: &ResolvedFeeConfig, sale: &SaleContext) -> LedgerResult<FeeBreakdown> {
        if sale.subtotal < Decimal::ZERO {
            return Err(LedgerError::negative("subtotal must not be negative"));
        }
        if sale.quantity < 1 {
            return Err(LedgerError::negative("quantity must be at least 1"));
        }
        let provider = config.provider(&sale.provider_id)?;
        let c = &config.currency;

        let uncapped = config.service_fee_percentage.of(sale.subtotal)
            + config.fixed_per_ticket * Decimal::from(sale.quantity);
        let service_fee = c.round(match config.cap {
            Some(cap) => uncapped.min(cap),
            None => uncapped,
        });

        let processing_base = sale.subtotal + service_fee;
        let processing_fee = c.round(
            provider.percentage.of(processing_base)
                + provider.fixed
                + config.processing_fee_fixed_per_order,
        );

        Ok(FeeBreakdown::from_parts(
            c.clone(),
            sale.subtotal,
            service_fee,
            processing_fee,
            Decimal::ZERO,
            Decimal::ZERO,
        ))
    }

    /// Fee on a donation to a free event.
    pub fn donation(config: &ResolvedFeeConfig, donation_amount: Decimal) -> LedgerResult<FeeBreakdown> {
        if donation_amount < Decimal::ZERO {
            return Err(LedgerError::negative("donation amount must not be negative"));
        }
        let c = &config.currency;
        let fee = c.round(config.donation_fee_percentage.of(donation_amount));
        Ok(FeeBreakdown::from_parts(
            c.clone(),
            donation_amount,
            Decimal::ZERO,
            Decimal::ZERO,
            fee,
            Decimal::ZERO,
        ))
    }

    /// Fee on transferring a ticket, based on its original price.
    pub fn transfer(config: &ResolvedFeeConfig, original_price: Decimal) -> LedgerResult<FeeBreakdown> {
        if original_price < Decimal::ZERO {
            return Err(LedgerError::negative("original ticket price must not be negative"));
        }
        let c = &config.currency;
        let fee = c.round(config.transfer_fee_percentage.of(original_price));
        Ok(FeeBreakdown::from_parts(
            c.clone(),
            original_price,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            fee,
        ))
    }
}
