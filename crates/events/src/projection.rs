use crate::{Event, EventEnvelope};

/// A projection builds a read model from committed events.
///
/// Delivery is at-least-once, so `apply` must be idempotent: an envelope whose
/// sequence number was already seen for its stream is a no-op. Read models are
/// disposable and can be rebuilt by replaying every stream from the start.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
