use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use feeledger_core::PayeeId;
use feeledger_fees::{CountryFeeConfig, PayeeProfile};

use super::store::{country_key, FeeSettingsStore, SettingsError};

#[derive(Debug, Clone)]
struct Cached<V> {
    value: V,
    loaded_at: Instant,
}

/// Read-through TTL cache in front of a [`FeeSettingsStore`].
///
/// Writes go to the inner store first and then evict the cached entry.
/// Misses are not cached, so a newly registered payee is visible immediately.
#[derive(Debug)]
pub struct CachedFeeSettings<S> {
    inner: S,
    ttl: Duration,
    countries: RwLock<HashMap<String, Cached<CountryFeeConfig>>>,
    payees: RwLock<HashMap<PayeeId, Cached<PayeeProfile>>>,
}

impl<S> CachedFeeSettings<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            countries: RwLock::new(HashMap::new()),
            payees: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        if let Ok(mut c) = self.countries.write() {
            c.clear();
        }
        if let Ok(mut p) = self.payees.write() {
            p.clear();
        }
    }

    fn fresh<V: Clone>(&self, entry: Option<&Cached<V>>) -> Option<V> {
        entry
            .filter(|c| c.loaded_at.elapsed() < self.ttl)
            .map(|c| c.value.clone())
    }
}

impl<S: FeeSettingsStore> FeeSettingsStore for CachedFeeSettings<S> {
    fn country(&self, country_code: &str) -> Result<Option<CountryFeeConfig>, SettingsError> {
        let key = country_key(country_code);
        {
            let cache = self.countries.read().map_err(|_| SettingsError::Poisoned)?;
            if let Some(hit) = self.fresh(cache.get(&key)) {
                return Ok(Some(hit));
            }
        }

        let loaded = self.inner.country(&key)?;
        if let Some(config) = &loaded {
            let mut cache = self.countries.write().map_err(|_| SettingsError::Poisoned)?;
            cache.insert(
                key,
                Cached {
                    value: config.clone(),
                    loaded_at: Instant::now(),
                },
            );
        }
        Ok(loaded)
    }

    fn put_country(&self, config: CountryFeeConfig) -> Result<(), SettingsError> {
        let key = country_key(&config.country_code);
        self.inner.put_country(config)?;
        let mut cache = self.countries.write().map_err(|_| SettingsError::Poisoned)?;
        cache.remove(&key);
        Ok(())
    }

    fn payee(&self, payee_id: PayeeId) -> Result<Option<PayeeProfile>, SettingsError> {
        {
            let cache = self.payees.read().map_err(|_| SettingsError::Poisoned)?;
            if let Some(hit) = self.fresh(cache.get(&payee_id)) {
                return Ok(Some(hit));
            }
        }

        let loaded = self.inner.payee(payee_id)?;
        if let Some(profile) = &loaded {
            let mut cache = self.payees.write().map_err(|_| SettingsError::Poisoned)?;
            cache.insert(
                payee_id,
                Cached {
                    value: profile.clone(),
                    loaded_at: Instant::now(),
                },
            );
        }
        Ok(loaded)
    }

    fn put_payee(&self, profile: PayeeProfile) -> Result<(), SettingsError> {
        let payee_id = profile.payee_id;
        self.inner.put_payee(profile)?;
        let mut cache = self.payees.write().map_err(|_| SettingsError::Poisoned)?;
        cache.remove(&payee_id);
        Ok(())
    }

    // Listings are only read on admin writes and always come from the store.
    fn countries(&self) -> Result<Vec<CountryFeeConfig>, SettingsError> {
        self.inner.countries()
    }

    fn payees(&self) -> Result<Vec<PayeeProfile>, SettingsError> {
        self.inner.payees()
    }
}
