use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use feeledger_core::StreamId;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend};

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<StreamId, Vec<StoredEvent>>,
    /// Every committed event, in commit order.
    log: Vec<StoredEvent>,
}

/// In-memory append-only event store.
///
/// A single write lock covers the version checks and the writes of a whole
/// batch, which is what makes `append_all` atomic.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    fn validate_batch(batch: &[StreamAppend]) -> Result<(), EventStoreError> {
        let mut seen = HashSet::new();
        for append in batch {
            if !seen.insert(&append.stream_id) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {} appears twice in one commit",
                    append.stream_id
                )));
            }
            let Some(first) = append.events.first() else {
                continue;
            };
            for (idx, e) in append.events.iter().enumerate() {
                if e.stream_id != append.stream_id {
                    return Err(EventStoreError::InvalidAppend(format!(
                        "event {idx} targets {} inside the batch for {}",
                        e.stream_id, append.stream_id
                    )));
                }
                if e.stream_type != first.stream_type {
                    return Err(EventStoreError::StreamTypeMismatch(format!(
                        "batch for {} mixes stream types (index {idx})",
                        append.stream_id
                    )));
                }
            }
        }
        Ok(())
    }
}

impl EventStore for InMemoryEventStore {
    fn append_all(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let batch: Vec<StreamAppend> = batch.into_iter().filter(|a| !a.events.is_empty()).collect();
        if batch.is_empty() {
            return Ok(vec![]);
        }
        Self::validate_batch(&batch)?;

        let mut inner = self
            .inner
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        // Check every stream before writing any of them.
        for append in &batch {
            let stream = inner.streams.get(&append.stream_id);
            let current = stream.map(|s| Self::current_version(s)).unwrap_or(0);
            if !append.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current}",
                    append.stream_id, append.expected_version
                )));
            }
            if let Some(existing) = stream.and_then(|s| s.first()) {
                let attempted = &append.events[0].stream_type;
                if &existing.stream_type != attempted {
                    return Err(EventStoreError::StreamTypeMismatch(format!(
                        "stream {} has type '{}', attempted append with '{attempted}'",
                        append.stream_id, existing.stream_type
                    )));
                }
            }
        }

        let mut position = inner.log.len() as u64;
        let mut committed = Vec::new();
        for append in batch {
            let stream = inner.streams.entry(append.stream_id).or_default();
            let mut next = Self::current_version(stream) + 1;
            for e in append.events {
                position += 1;
                let stored = StoredEvent {
                    event_id: e.event_id,
                    stream_id: e.stream_id,
                    stream_type: e.stream_type,
                    sequence_number: next,
                    global_position: position,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                committed.push(stored);
            }
        }
        inner.log.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(&self, stream_id: &StreamId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(inner.streams.get(stream_id).cloned().unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(inner.log.clone())
    }
}
