use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;
use tracing::info;

use feeledger_events::{EventBus, EventEnvelope, InMemoryEventBus};
use feeledger_infra::{
    command_dispatcher::CommandDispatcher,
    event_store::{EventStore, InMemoryEventStore},
    projections::CurrencySummaryProjection,
    settings::{CachedFeeSettings, FeeSettingsSeed, InMemoryFeeSettings},
    workers::{ProjectionWorker, WorkerHandle},
    LedgerConfig, LedgerService,
};

pub type AppEventStore = Arc<InMemoryEventStore>;
pub type AppEventBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type AppFeeSettings = CachedFeeSettings<InMemoryFeeSettings>;
pub type AppLedger = LedgerService<AppEventStore, AppEventBus, AppFeeSettings>;

/// Everything the handlers need, shared behind an `Arc`.
#[derive(Debug)]
pub struct AppServices {
    ledger: AppLedger,
    event_store: AppEventStore,
    summaries: Arc<CurrencySummaryProjection>,
    summary_worker: Mutex<Option<WorkerHandle>>,
}

/// Wire the in-memory store and bus, load the optional fee settings seed and
/// start the currency summary worker.
pub fn build_services(config: &LedgerConfig) -> anyhow::Result<AppServices> {
    let event_store: AppEventStore = Arc::new(InMemoryEventStore::new());
    let bus: AppEventBus = Arc::new(InMemoryEventBus::new());

    let settings = CachedFeeSettings::new(InMemoryFeeSettings::new(), config.fee_cache_ttl);
    if let Some(path) = &config.fee_settings_path {
        FeeSettingsSeed::from_path(path)?.load_into(&settings)?;
    }

    // Subscribe before replaying so nothing committed in between is lost; the
    // projection drops redelivered events by cursor.
    let summaries = Arc::new(CurrencySummaryProjection::new());
    let sub = bus.subscribe();
    summaries.rebuild(&event_store.load_all()?)?;

    let projection = summaries.clone();
    let summary_worker = ProjectionWorker::spawn_with("currency-summary", sub, move |envelope| {
        projection.apply_envelope(&envelope)
    })?;

    let ledger = LedgerService::new(
        CommandDispatcher::new(event_store.clone(), bus),
        settings,
        config.max_conflict_retries,
    );

    info!(
        fee_cache_ttl_secs = config.fee_cache_ttl.as_secs(),
        max_conflict_retries = config.max_conflict_retries,
        "ledger services ready"
    );

    Ok(AppServices {
        ledger,
        event_store,
        summaries,
        summary_worker: Mutex::new(Some(summary_worker)),
    })
}

impl AppServices {
    pub fn ledger(&self) -> &AppLedger {
        &self.ledger
    }

    pub fn event_store(&self) -> &AppEventStore {
        &self.event_store
    }

    pub fn summaries(&self) -> &CurrencySummaryProjection {
        &self.summaries
    }

    /// Stop the summary worker. Later calls are no-ops.
    pub fn shutdown(&self) {
        let handle = match self.summary_worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.shutdown();
        }
    }
}
