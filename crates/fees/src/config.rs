use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use feeledger_core::{Currency, LedgerError, LedgerResult, PayeeId, Percentage};

/// Processing fee charged by one payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFee {
    pub percentage: Percentage,
    pub fixed: Decimal,
}

/// Admin-maintained fee defaults for one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryFeeConfig {
    pub country_code: String,
    pub currency: Currency,
    pub service_fee_percentage: Percentage,
    pub service_fee_fixed_per_ticket: Decimal,
    #[serde(default)]
    pub service_fee_cap: Option<Decimal>,
    #[serde(default)]
    pub processing_fee_fixed_per_order: Decimal,
    #[serde(default = "zero_percent")]
    pub donation_fee_percentage: Percentage,
    #[serde(default = "zero_percent")]
    pub transfer_fee_percentage: Percentage,
    /// Keyed by provider id (e.g. "paystack", "stripe").
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderFee>,
}

fn zero_percent() -> Percentage {
    Percentage::ZERO
}

impl CountryFeeConfig {
    /// Validate before saving. A cap below the single-ticket minimum fee is
    /// rejected here so that pricing a sale can never fail on it.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.country_code.trim().is_empty() {
            return Err(LedgerError::UnknownCountry(self.country_code.clone()));
        }
        ensure_non_negative("service_fee_fixed_per_ticket", self.service_fee_fixed_per_ticket)?;
        ensure_non_negative("processing_fee_fixed_per_order", self.processing_fee_fixed_per_order)?;
        for (id, provider) in &self.providers {
            ensure_non_negative(&format!("providers.{id}.fixed"), provider.fixed)?;
        }
        if let Some(cap) = self.service_fee_cap {
            ensure_non_negative("service_fee_cap", cap)?;
            ensure_cap_covers(cap, self.service_fee_fixed_per_ticket)?;
        }
        Ok(())
    }

    pub fn provider(&self, provider_id: &str) -> LedgerResult<&ProviderFee> {
        self.providers
            .get(provider_id)
            .ok_or_else(|| LedgerError::UnknownProvider(provider_id.to_string()))
    }
}

/// Per-payee replacement of the country's service fee fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayeeFeeOverride {
    pub enabled: bool,
    #[serde(default)]
    pub percentage: Option<Percentage>,
    #[serde(default)]
    pub fixed: Option<Decimal>,
    #[serde(default)]
    pub cap: Option<Decimal>,
}

impl PayeeFeeOverride {
    pub fn validate(&self) -> LedgerResult<()> {
        if let Some(fixed) = self.fixed {
            ensure_non_negative("override.fixed", fixed)?;
        }
        if let Some(cap) = self.cap {
            ensure_non_negative("override.cap", cap)?;
            if let Some(fixed) = self.fixed {
                ensure_cap_covers(cap, fixed)?;
            }
        }
        Ok(())
    }
}

/// A registered payee (affiliate or promoter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayeeProfile {
    pub payee_id: PayeeId,
    pub display_name: String,
    pub default_commission_rate: Percentage,
    #[serde(default)]
    pub fee_override: Option<PayeeFeeOverride>,
}

impl PayeeProfile {
    pub fn validate(&self) -> LedgerResult<()> {
        match &self.fee_override {
            Some(o) => o.validate(),
            None => Ok(()),
        }
    }

    /// Check the service fee this payee would be charged in `country`.
    pub fn validate_in(&self, country: &CountryFeeConfig) -> LedgerResult<()> {
        ResolvedFeeConfig::resolve(country, self.fee_override.as_ref()).validate()
    }
}

/// Country defaults merged with an enabled payee override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFeeConfig {
    pub currency: Currency,
    pub service_fee_percentage: Percentage,
    pub fixed_per_ticket: Decimal,
    pub cap: Option<Decimal>,
    pub processing_fee_fixed_per_order: Decimal,
    pub donation_fee_percentage: Percentage,
    pub transfer_fee_percentage: Percentage,
    pub providers: BTreeMap<String, ProviderFee>,
}

impl ResolvedFeeConfig {
    pub fn resolve(country: &CountryFeeConfig, payee_override: Option<&PayeeFeeOverride>) -> Self {
        let mut resolved = Self {
            currency: country.currency.clone(),
            service_fee_percentage: country.service_fee_percentage,
            fixed_per_ticket: country.service_fee_fixed_per_ticket,
            cap: country.service_fee_cap,
            processing_fee_fixed_per_order: country.processing_fee_fixed_per_order,
            donation_fee_percentage: country.donation_fee_percentage,
            transfer_fee_percentage: country.transfer_fee_percentage,
            providers: country.providers.clone(),
        };

        if let Some(o) = payee_override.filter(|o| o.enabled) {
            if let Some(percentage) = o.percentage {
                resolved.service_fee_percentage = percentage;
            }
            if let Some(fixed) = o.fixed {
                resolved.fixed_per_ticket = fixed;
            }
            if let Some(cap) = o.cap {
                resolved.cap = Some(cap);
            }
        }

        resolved
    }

    /// A payee override may mix its own cap with the country's fixed fee (or
    /// the reverse), so the merged fields are checked again here.
    pub fn validate(&self) -> LedgerResult<()> {
        match self.cap {
            Some(cap) => ensure_cap_covers(cap, self.fixed_per_ticket),
            None => Ok(()),
        }
    }

    pub fn provider(&self, provider_id: &str) -> LedgerResult<&ProviderFee> {
        self.providers
            .get(provider_id)
            .ok_or_else(|| LedgerError::UnknownProvider(provider_id.to_string()))
    }
}

fn ensure_non_negative(field: &str, value: Decimal) -> LedgerResult<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(LedgerError::negative(format!("{field} must not be negative")));
    }
    Ok(())
}

fn ensure_cap_covers(cap: Decimal, fixed_per_ticket: Decimal) -> LedgerResult<()> {
    if cap < fixed_per_ticket {
        return Err(LedgerError::CapMisconfigured {
            cap,
            minimum: fixed_per_ticket,
        });
    }
    Ok(())
}
