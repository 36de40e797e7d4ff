//! Service configuration, read from `FEELEDGER_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const BIND_ADDR_VAR: &str = "FEELEDGER_BIND_ADDR";
pub const FEE_CACHE_TTL_VAR: &str = "FEELEDGER_FEE_CACHE_TTL_SECS";
pub const MAX_CONFLICT_RETRIES_VAR: &str = "FEELEDGER_MAX_CONFLICT_RETRIES";
pub const FEE_SETTINGS_PATH_VAR: &str = "FEELEDGER_FEE_SETTINGS_PATH";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid value: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub bind_addr: SocketAddr,
    pub fee_cache_ttl: Duration,
    /// Reload-and-retry attempts after an optimistic concurrency conflict.
    pub max_conflict_retries: u32,
    /// Optional JSON file with initial countries and payees.
    pub fee_settings_path: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            fee_cache_ttl: Duration::from_secs(60),
            max_conflict_retries: 5,
            fee_settings_path: None,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source; unset or empty variables keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(raw) = get(BIND_ADDR_VAR) {
            config.bind_addr = parse(BIND_ADDR_VAR, raw)?;
        }
        if let Some(raw) = get(FEE_CACHE_TTL_VAR) {
            config.fee_cache_ttl = Duration::from_secs(parse(FEE_CACHE_TTL_VAR, raw)?);
        }
        if let Some(raw) = get(MAX_CONFLICT_RETRIES_VAR) {
            config.max_conflict_retries = parse(MAX_CONFLICT_RETRIES_VAR, raw)?;
        }
        config.fee_settings_path = get(FEE_SETTINGS_PATH_VAR).map(PathBuf::from);

        Ok(config)
    }
}

fn parse<T>(var: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value: raw,
    })
}
