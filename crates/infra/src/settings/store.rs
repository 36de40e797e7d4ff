use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use feeledger_core::{LedgerError, PayeeId};
use feeledger_fees::{CountryFeeConfig, PayeeProfile};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("fee settings lock poisoned")]
    Poisoned,

    #[error("failed to read fee settings seed: {0}")]
    Seed(String),

    #[error("invalid fee settings: {0}")]
    Invalid(#[from] LedgerError),
}

impl From<SettingsError> for LedgerError {
    fn from(value: SettingsError) -> Self {
        match value {
            SettingsError::Invalid(e) => e,
            other => LedgerError::storage(other.to_string()),
        }
    }
}

/// Storage for admin-maintained fee configuration.
///
/// Country codes are matched case-insensitively.
pub trait FeeSettingsStore: Send + Sync {
    fn country(&self, country_code: &str) -> Result<Option<CountryFeeConfig>, SettingsError>;

    fn put_country(&self, config: CountryFeeConfig) -> Result<(), SettingsError>;

    fn payee(&self, payee_id: PayeeId) -> Result<Option<PayeeProfile>, SettingsError>;

    fn put_payee(&self, profile: PayeeProfile) -> Result<(), SettingsError>;

    fn countries(&self) -> Result<Vec<CountryFeeConfig>, SettingsError>;

    fn payees(&self) -> Result<Vec<PayeeProfile>, SettingsError>;
}

impl<S> FeeSettingsStore for Arc<S>
where
    S: FeeSettingsStore + ?Sized,
{
    fn country(&self, country_code: &str) -> Result<Option<CountryFeeConfig>, SettingsError> {
        (**self).country(country_code)
    }

    fn put_country(&self, config: CountryFeeConfig) -> Result<(), SettingsError> {
        (**self).put_country(config)
    }

    fn payee(&self, payee_id: PayeeId) -> Result<Option<PayeeProfile>, SettingsError> {
        (**self).payee(payee_id)
    }

    fn put_payee(&self, profile: PayeeProfile) -> Result<(), SettingsError> {
        (**self).put_payee(profile)
    }

    fn countries(&self) -> Result<Vec<CountryFeeConfig>, SettingsError> {
        (**self).countries()
    }

    fn payees(&self) -> Result<Vec<PayeeProfile>, SettingsError> {
        (**self).payees()
    }
}

pub(crate) fn country_key(country_code: &str) -> String {
    country_code.trim().to_ascii_uppercase()
}

/// In-memory settings for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryFeeSettings {
    countries: RwLock<HashMap<String, CountryFeeConfig>>,
    payees: RwLock<HashMap<PayeeId, PayeeProfile>>,
}

impl InMemoryFeeSettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeeSettingsStore for InMemoryFeeSettings {
    fn country(&self, country_code: &str) -> Result<Option<CountryFeeConfig>, SettingsError> {
        let countries = self.countries.read().map_err(|_| SettingsError::Poisoned)?;
        Ok(countries.get(&country_key(country_code)).cloned())
    }

    fn put_country(&self, config: CountryFeeConfig) -> Result<(), SettingsError> {
        let mut countries = self.countries.write().map_err(|_| SettingsError::Poisoned)?;
        countries.insert(country_key(&config.country_code), config);
        Ok(())
    }

    fn payee(&self, payee_id: PayeeId) -> Result<Option<PayeeProfile>, SettingsError> {
        let payees = self.payees.read().map_err(|_| SettingsError::Poisoned)?;
        Ok(payees.get(&payee_id).cloned())
    }

    fn put_payee(&self, profile: PayeeProfile) -> Result<(), SettingsError> {
        let mut payees = self.payees.write().map_err(|_| SettingsError::Poisoned)?;
        payees.insert(profile.payee_id, profile);
        Ok(())
    }

    fn countries(&self) -> Result<Vec<CountryFeeConfig>, SettingsError> {
        let countries = self.countries.read().map_err(|_| SettingsError::Poisoned)?;
        Ok(countries.values().cloned().collect())
    }

    fn payees(&self) -> Result<Vec<PayeeProfile>, SettingsError> {
        let payees = self.payees.read().map_err(|_| SettingsError::Poisoned)?;
        Ok(payees.values().cloned().collect())
    }
}
