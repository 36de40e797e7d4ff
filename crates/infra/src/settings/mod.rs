//! Fee settings: country fee tables and payee profiles.
//!
//! Admin writes go through [`FeeSettingsStore`]. Sales read through a
//! [`CachedFeeSettings`] that expires entries after a TTL and drops an entry
//! as soon as it is written, so a saved configuration applies to the next
//! sale priced.

pub mod cache;
pub mod seed;
pub mod store;

pub use cache::CachedFeeSettings;
pub use seed::FeeSettingsSeed;
pub use store::{FeeSettingsStore, InMemoryFeeSettings, SettingsError};
