use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use feeledger_events::Event;

use crate::bucket::{BucketEvent, BUCKET_STREAM_TYPE};
use crate::sale::{SaleEvent, SALE_STREAM_TYPE};

/// Every event the ledger persists. One store and one bus carry both
/// aggregates so a multi-stream commit is published as a single batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Sale(SaleEvent),
    Bucket(BucketEvent),
}

impl LedgerEvent {
    pub fn stream_type(&self) -> &'static str {
        match self {
            LedgerEvent::Sale(_) => SALE_STREAM_TYPE,
            LedgerEvent::Bucket(_) => BUCKET_STREAM_TYPE,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::Sale(e) => e.event_type(),
            LedgerEvent::Bucket(e) => e.event_type(),
        }
    }

    fn version(&self) -> u32 {
        match self {
            LedgerEvent::Sale(e) => e.version(),
            LedgerEvent::Bucket(e) => e.version(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::Sale(e) => e.occurred_at(),
            LedgerEvent::Bucket(e) => e.occurred_at(),
        }
    }
}

impl From<SaleEvent> for LedgerEvent {
    fn from(value: SaleEvent) -> Self {
        LedgerEvent::Sale(value)
    }
}

impl From<BucketEvent> for LedgerEvent {
    fn from(value: BucketEvent) -> Self {
        LedgerEvent::Bucket(value)
    }
}
