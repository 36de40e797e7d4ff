use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use feeledger_fees::{CountryFeeConfig, PayeeProfile};

use super::store::{FeeSettingsStore, SettingsError};

/// Initial fee configuration, loaded from a JSON file at startup.
///
/// ```json
/// { "countries": [ { "country_code": "NG", "currency": "NGN", ... } ],
///   "payees": [ { "payee_id": "...", "display_name": "...", ... } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSettingsSeed {
    #[serde(default)]
    pub countries: Vec<CountryFeeConfig>,
    #[serde(default)]
    pub payees: Vec<PayeeProfile>,
}

impl FeeSettingsSeed {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Seed(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(raw).map_err(|e| SettingsError::Seed(e.to_string()))
    }

    /// Validate every entry, then write them all. An invalid entry loads nothing.
    pub fn load_into(&self, store: &impl FeeSettingsStore) -> Result<(), SettingsError> {
        for country in &self.countries {
            country.validate()?;
        }
        for payee in &self.payees {
            payee.validate()?;
            for country in &self.countries {
                payee.validate_in(country)?;
            }
        }

        for country in &self.countries {
            store.put_country(country.clone())?;
        }
        for payee in &self.payees {
            store.put_payee(payee.clone())?;
        }

        info!(
            countries = self.countries.len(),
            payees = self.payees.len(),
            "fee settings seeded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::InMemoryFeeSettings;
    use feeledger_core::LedgerError;

    const SEED: &str = r#"{
        "countries": [{
            "country_code": "NG",
            "currency": "NGN",
            "service_fee_percentage": "5",
            "service_fee_fixed_per_ticket": "0",
            "providers": { "paystack": { "percentage": "1.5", "fixed": "100" } }
        }],
        "payees": [{
            "payee_id": "0190c0de-0000-7000-8000-000000000001",
            "display_name": "Promoter",
            "default_commission_rate": "10"
        }]
    }"#;

    #[test]
    fn seed_loads_countries_and_payees() {
        let store = InMemoryFeeSettings::new();
        FeeSettingsSeed::from_json(SEED).unwrap().load_into(&store).unwrap();

        let ng = store.country("NG").unwrap().unwrap();
        assert!(ng.provider("paystack").is_ok());
        let payee_id = "0190c0de-0000-7000-8000-000000000001".parse().unwrap();
        assert!(store.payee(payee_id).unwrap().is_some());
    }

    #[test]
    fn invalid_seed_loads_nothing() {
        let mut seed = FeeSettingsSeed::from_json(SEED).unwrap();
        seed.countries[0].service_fee_fixed_per_ticket = rust_decimal::Decimal::from(100);
        seed.countries[0].service_fee_cap = Some(rust_decimal::Decimal::from(10));

        let store = InMemoryFeeSettings::new();
        let err = seed.load_into(&store).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(LedgerError::CapMisconfigured { .. })));
        assert!(store.country("NG").unwrap().is_none());
    }

    #[test]
    fn seeded_override_cap_is_checked_against_seeded_countries() {
        let mut seed = FeeSettingsSeed::from_json(SEED).unwrap();
        seed.countries[0].service_fee_fixed_per_ticket = rust_decimal::Decimal::from(100);
        seed.payees[0].fee_override = Some(feeledger_fees::PayeeFeeOverride {
            enabled: true,
            percentage: None,
            fixed: None,
            cap: Some(rust_decimal::Decimal::from(50)),
        });

        let store = InMemoryFeeSettings::new();
        let err = seed.load_into(&store).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(LedgerError::CapMisconfigured { .. })));
        assert!(store.payees().unwrap().is_empty());
    }

    #[test]
    fn malformed_json_is_a_seed_error() {
        assert!(matches!(
            FeeSettingsSeed::from_json("{ nope"),
            Err(SettingsError::Seed(_))
        ));
    }
}
