use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, instrument, warn};

use feeledger_commissions::{
    AdvanceEntry, AssessSale, BucketCommand, BucketKey, CommissionEntry, CommissionStatus,
    LedgerBalance, RecordCommission, SaleCommand, SaleFees,
};
use feeledger_core::{Currency, EntryId, LedgerError, LedgerResult, PayeeId, SaleId};
use feeledger_events::{
    EventBus, EventEnvelope, FeePreviewRequest, LedgerSnapshot, SaleRecorded, SettlementReported,
};
use feeledger_fees::{
    CountryFeeConfig, FeeBreakdown, FeeCalculator, PayeeProfile, ResolvedFeeConfig, SaleContext,
};

use super::LedgerService;
use crate::event_store::EventStore;
use crate::settings::FeeSettingsStore;

/// Result of recording a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedSale {
    pub sale_id: SaleId,
    pub fees: FeeBreakdown,
    /// Absent for sales without a payee.
    pub commission: Option<CommissionEntry>,
}

impl<S, B, F> LedgerService<S, B, F>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    F: FeeSettingsStore,
{
    fn country_config(&self, country_code: &str) -> LedgerResult<CountryFeeConfig> {
        self.settings()
            .country(country_code)?
            .ok_or_else(|| LedgerError::UnknownCountry(country_code.to_string()))
    }

    fn resolve_fees(
        &self,
        country_code: &str,
        payee_id: Option<PayeeId>,
    ) -> LedgerResult<(ResolvedFeeConfig, Option<PayeeProfile>)> {
        let country = self.country_config(country_code)?;
        let profile = payee_id.map(|id| self.registered_payee(id)).transpose()?;
        let fee_override = profile.as_ref().and_then(|p| p.fee_override.as_ref());
        Ok((ResolvedFeeConfig::resolve(&country, fee_override), profile))
    }

    /// Price a checkout without persisting anything.
    #[instrument(skip(self, request), fields(country = %request.country_code, provider = %request.provider_id))]
    pub fn fee_preview(&self, request: &FeePreviewRequest) -> LedgerResult<FeeBreakdown> {
        let (config, _) = self.resolve_fees(&request.country_code, request.payee_id)?;
        FeeCalculator::checkout(
            &config,
            &SaleContext {
                subtotal: request.subtotal,
                quantity: request.quantity,
                provider_id: request.provider_id.clone(),
            },
        )
    }

    /// Fee on a donation to a free event in `country_code`.
    pub fn donation_fee(&self, country_code: &str, amount: rust_decimal::Decimal) -> LedgerResult<FeeBreakdown> {
        let (config, _) = self.resolve_fees(country_code, None)?;
        FeeCalculator::donation(&config, amount)
    }

    /// Fee on transferring a ticket originally sold for `original_price`.
    pub fn transfer_fee(
        &self,
        country_code: &str,
        original_price: rust_decimal::Decimal,
    ) -> LedgerResult<FeeBreakdown> {
        let (config, _) = self.resolve_fees(country_code, None)?;
        FeeCalculator::transfer(&config, original_price)
    }

    /// Assess fees for a sale and, when it has a payee, record its pending
    /// commission. Both streams are committed together.
    #[instrument(skip(self, sale), fields(sale_id = %sale.sale_id, currency = %sale.currency))]
    pub fn record_sale(&self, sale: &SaleRecorded) -> LedgerResult<RecordedSale> {
        let (config, profile) = self.resolve_fees(&sale.country_code, sale.payee_id)?;
        if config.currency != sale.currency {
            return Err(LedgerError::invalid_currency(format!(
                "sale in {} but {} prices in {}",
                sale.currency, sale.country_code, config.currency
            )));
        }
        let fees = FeeCalculator::checkout(
            &config,
            &SaleContext {
                subtotal: sale.subtotal,
                quantity: sale.quantity,
                provider_id: sale.provider_id.clone(),
            },
        )?;
        let commission_rate = profile
            .as_ref()
            .map(|p| sale.commission_rate.unwrap_or(p.default_commission_rate));

        let recorded = self.with_retries("record_sale", || {
            let now = Utc::now();
            let mut sale_stream = self.load_sale(sale.sale_id)?;
            let assessed = sale_stream.decide(&SaleCommand::AssessSale(AssessSale {
                sale_id: sale.sale_id,
                organizer_id: sale.organizer_id,
                payee_id: sale.payee_id,
                commission_rate,
                country_code: sale.country_code.clone(),
                provider_id: sale.provider_id.clone(),
                quantity: sale.quantity,
                fees: fees.clone(),
                occurred_at: now,
            }))?;

            let (Some(payee_id), Some(rate)) = (sale.payee_id, commission_rate) else {
                self.dispatcher().commit([assessed])?;
                return Ok(None);
            };

            let key = BucketKey::new(payee_id, sale.currency.clone());
            let mut bucket = self.load_bucket(&key)?;
            let recorded = bucket.decide(&BucketCommand::RecordCommission(RecordCommission {
                sale_id: sale.sale_id,
                organizer_id: sale.organizer_id,
                currency: sale.currency.clone(),
                subtotal: sale.subtotal,
                commission_rate: rate,
                occurred_at: now,
            }))?;

            self.dispatcher().commit([assessed, recorded])?;
            Ok(bucket.aggregate.entry(EntryId::from(sale.sale_id)).cloned())
        })?;

        info!(
            grand_total = %fees.grand_total,
            commission = ?recorded.as_ref().map(|e| e.commission_amount),
            "sale recorded"
        );

        Ok(RecordedSale {
            sale_id: sale.sale_id,
            fees,
            commission: recorded,
        })
    }

    /// Settlement signal: the sale's commission becomes eligible for payout.
    #[instrument(skip(self, settlement), fields(sale_id = %settlement.sale_id))]
    pub fn mark_available(&self, settlement: &SettlementReported) -> LedgerResult<CommissionEntry> {
        let sale_id = settlement.sale_id;
        let entry = self.with_retries("mark_available", || {
            let sale = self.existing_sale(sale_id)?;
            let Some(key) = self.sale_bucket(&sale.aggregate) else {
                return Err(LedgerError::transition(format!("sale {sale_id} has no commission entry")).into());
            };

            let bucket = self.dispatch_bucket(
                &key,
                BucketCommand::AdvanceEntry(AdvanceEntry {
                    entry_id: EntryId::from(sale_id),
                    to: CommissionStatus::Available,
                    occurred_at: Utc::now(),
                }),
            )?;

            bucket
                .entry(EntryId::from(sale_id))
                .cloned()
                .ok_or_else(|| LedgerError::UnknownSale(sale_id).into())
        })?;

        info!(payee_id = %entry.payee_id, "commission available");
        Ok(entry)
    }

    /// Balance of one `(payee, currency)` bucket, derived at read time.
    #[instrument(skip(self))]
    pub fn balance(&self, payee_id: PayeeId, currency: &Currency) -> LedgerResult<LedgerBalance> {
        Ok(self.bucket(payee_id, currency)?.balance())
    }

    pub fn snapshot(&self, payee_id: PayeeId, currency: &Currency) -> LedgerResult<LedgerSnapshot> {
        Ok(self.balance(payee_id, currency)?.to_snapshot())
    }

    /// Fees of a recorded sale after any refunds.
    pub fn sale_fees(&self, sale_id: SaleId) -> LedgerResult<FeeBreakdown> {
        let sale = self.existing_sale(sale_id)?;
        sale.aggregate
            .effective_fees()
            .ok_or_else(|| LedgerError::UnknownSale(sale_id))
    }

    /// Validate and save a country fee table. Applies to subsequent sales only.
    ///
    /// Rejected if it would leave any registered payee's override with a cap
    /// below the fixed per-ticket fee.
    #[instrument(skip(self, config), fields(country = %config.country_code))]
    pub fn save_country(&self, config: CountryFeeConfig) -> LedgerResult<()> {
        config.validate()?;
        for payee in self.settings().payees()? {
            if let Err(err) = payee.validate_in(&config) {
                warn!(payee_id = %payee.payee_id, error = %err, "country table conflicts with payee override");
                return Err(err);
            }
        }
        self.settings().put_country(config)?;
        info!("country fee configuration saved");
        Ok(())
    }

    /// Register or update a payee.
    #[instrument(skip(self, profile), fields(payee_id = %profile.payee_id))]
    pub fn save_payee(&self, profile: PayeeProfile) -> LedgerResult<()> {
        profile.validate()?;
        for country in self.settings().countries()? {
            if let Err(err) = profile.validate_in(&country) {
                warn!(country = %country.country_code, error = %err, "payee override conflicts with country table");
                return Err(err);
            }
        }
        self.settings().put_payee(profile)?;
        info!("payee profile saved");
        Ok(())
    }

    pub fn country(&self, country_code: &str) -> LedgerResult<CountryFeeConfig> {
        self.country_config(country_code)
    }

    pub fn payee(&self, payee_id: PayeeId) -> LedgerResult<PayeeProfile> {
        self.registered_payee(payee_id)
    }

    /// The bucket holding the sale's commission, if it has a payee.
    pub(super) fn sale_bucket(&self, sale: &SaleFees) -> Option<BucketKey> {
        Some(BucketKey::new(sale.payee_id()?, sale.currency()?.clone()))
    }
}
