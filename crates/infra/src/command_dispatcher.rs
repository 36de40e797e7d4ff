//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the stream and rehydrate the aggregate
//!   ↓
//! 2. Handle the command (pure decision logic, produces events)
//!   ↓
//! 3. Commit one or more streams atomically (optimistic concurrency check)
//!   ↓
//! 4. Publish the committed events to the bus
//! ```
//!
//! Most ledger operations touch two streams (a sale and a bucket), so load /
//! decide / commit are exposed separately and `dispatch` composes them for the
//! single-stream case.

use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use feeledger_core::{Aggregate, ExpectedVersion, LedgerError, StreamId};
use feeledger_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The aggregate rejected the command.
    #[error(transparent)]
    Domain(#[from] LedgerError),
    /// Optimistic concurrency failure; reload and retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    /// Failed to deserialize historical event payloads into the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    #[error(transparent)]
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    #[error("publication failed: {0}")]
    Publish(String),
}

impl DispatchError {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, DispatchError::Concurrency(_))
    }
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DispatchError> for LedgerError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Domain(e) => e,
            DispatchError::Concurrency(msg) => LedgerError::Conflict(msg),
            other => LedgerError::storage(other.to_string()),
        }
    }
}

/// An aggregate rehydrated from its stream, together with the stream revision
/// the eventual append will assert.
#[derive(Debug)]
pub struct Loaded<A> {
    pub aggregate: A,
    stream_id: StreamId,
    stream_type: &'static str,
    expected: ExpectedVersion,
}

impl<A> Loaded<A>
where
    A: Aggregate<Error = LedgerError>,
    A::Event: feeledger_events::Event + Serialize,
{
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// Handle `command`, apply the decided events to the in-memory aggregate
    /// and return them as a pending append. `None` means the command was a
    /// no-op.
    pub fn decide(&mut self, command: &A::Command) -> Result<Option<StreamAppend>, DispatchError> {
        let decided = self.aggregate.handle(command)?;
        if decided.is_empty() {
            return Ok(None);
        }

        let events = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(self.stream_id.clone(), self.stream_type, Uuid::now_v7(), ev)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for ev in &decided {
            self.aggregate.apply(ev);
        }

        Ok(Some(StreamAppend {
            stream_id: self.stream_id.clone(),
            expected_version: self.expected,
            events,
        }))
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// ## Execution Guarantees
///
/// - **Atomicity**: a commit persists every stream of the batch or none
/// - **Consistency**: each stream is appended at the revision it was loaded at
/// - **Ordering**: append and publish happen under one lock, so read models
///   observe events in commit order
///
/// If publication fails after a successful append the error is returned; the
/// events are persisted and a rebuild from the store recovers the read models.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    commit_lock: Mutex<()>,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Load and rehydrate the aggregate stored in `stream_id`.
    pub fn load<A>(
        &self,
        stream_id: StreamId,
        stream_type: &'static str,
        make_aggregate: impl FnOnce() -> A,
    ) -> Result<Loaded<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(&stream_id)?;
        validate_loaded_stream(&stream_id, &history)?;
        let version = stream_version(&history);

        let mut aggregate = make_aggregate();
        apply_history(&mut aggregate, &history)?;

        Ok(Loaded {
            aggregate,
            stream_id,
            stream_type,
            expected: if version == 0 {
                ExpectedVersion::NoStream
            } else {
                ExpectedVersion::Exact(version)
            },
        })
    }

    /// Persist the pending appends in one atomic commit, then publish them.
    pub fn commit(
        &self,
        appends: impl IntoIterator<Item = Option<StreamAppend>>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let batch: Vec<StreamAppend> = appends.into_iter().flatten().collect();
        if batch.is_empty() {
            return Ok(vec![]);
        }

        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| DispatchError::Publish("commit lock poisoned".to_string()))?;

        let committed = self.store.append_all(batch)?;

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    /// Load, decide and commit against a single stream.
    pub fn dispatch<A>(
        &self,
        stream_id: StreamId,
        stream_type: &'static str,
        command: A::Command,
        make_aggregate: impl FnOnce() -> A,
    ) -> Result<(A, Vec<StoredEvent>), DispatchError>
    where
        A: Aggregate<Error = LedgerError>,
        A::Event: feeledger_events::Event + Serialize + DeserializeOwned,
    {
        let mut loaded = self.load(stream_id, stream_type, make_aggregate)?;
        let pending = loaded.decide(&command)?;
        let committed = self.commit([pending])?;
        Ok((loaded.aggregate, committed))
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(stream_id: &StreamId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if &e.stream_id != stream_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream {stream_id} contains an event of {} at index {idx}",
                e.stream_id
            ))));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
