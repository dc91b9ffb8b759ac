use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::event_sourcing::{Aggregate, EventEnvelope};

// ============================================================================
// Event Bus - Publication Fan-Out
// ============================================================================
//
// Channel-based fan-out of domain event envelopes and state signals, typed
// per aggregate. Envelopes are published only after their journal append
// succeeded, in sequence order per identity; there is no ordering guarantee
// across identities.
//
// Delivery is at-least-once from the engine's perspective. A subscriber
// that lags far enough to be dropped observes `Lagged` and can catch up
// from the journal via `read_from`, using the sequence number as the
// dedupe key.
//
// ============================================================================

/// Read-only snapshot of one aggregate, published on request.
///
/// Carries the sequence number and state as of the last applied event.
/// Producing a signal never appends anything and never advances the
/// sequence number.
#[derive(Debug, Clone)]
pub struct StateSignal<A: Aggregate> {
    pub aggregate_id: A::Id,
    pub sequence_number: u64,
    pub state: A,
    pub timestamp: DateTime<Utc>,
}

/// Everything the engine announces to subscribers.
#[derive(Debug, Clone)]
pub enum Publication<A: Aggregate> {
    Event(EventEnvelope<A>),
    StateSignal(StateSignal<A>),
}

impl<A: Aggregate> Publication<A> {
    /// Identity this publication belongs to.
    pub fn aggregate_id(&self) -> &A::Id {
        match self {
            Publication::Event(envelope) => &envelope.aggregate_id,
            Publication::StateSignal(signal) => &signal.aggregate_id,
        }
    }
}

pub struct EventBus<A: Aggregate> {
    sender: broadcast::Sender<Publication<A>>,
}

impl<A: Aggregate> Clone for EventBus<A> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<A: Aggregate> EventBus<A> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all publications for this aggregate type.
    ///
    /// Filtering down to one event variant (or one identity) is the
    /// subscriber's match on the received value.
    pub fn subscribe(&self) -> broadcast::Receiver<Publication<A>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub(crate) fn publish(&self, publication: Publication<A>) {
        if self.sender.send(publication).is_err() {
            tracing::trace!(
                aggregate_type = A::AGGREGATE_TYPE,
                "no active subscribers, publication dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cart::{CartAggregate, CartCreated, CartEvent, CartId};

    fn created_envelope(cart_id: CartId, sequence: u64) -> EventEnvelope<CartAggregate> {
        EventEnvelope::new(cart_id, sequence, CartEvent::Created(CartCreated { cart_id }))
    }

    #[tokio::test]
    async fn subscribers_receive_publications_in_order() {
        let bus = EventBus::<CartAggregate>::new(16);
        let mut subscription = bus.subscribe();
        let cart_id = CartId::new();

        bus.publish(Publication::Event(created_envelope(cart_id, 1)));
        bus.publish(Publication::StateSignal(StateSignal {
            aggregate_id: cart_id,
            sequence_number: 1,
            state: CartAggregate::default(),
            timestamp: Utc::now(),
        }));

        let first = subscription.recv().await.unwrap();
        assert!(matches!(first, Publication::Event(ref e) if e.sequence_number == 1));
        let second = subscription.recv().await.unwrap();
        assert!(matches!(second, Publication::StateSignal(ref s) if s.sequence_number == 1));
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_not_an_error() {
        let bus = EventBus::<CartAggregate>::new(16);
        let cart_id = CartId::new();
        bus.publish(Publication::Event(created_envelope(cart_id, 1)));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn each_subscriber_sees_every_publication() {
        let bus = EventBus::<CartAggregate>::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        let cart_id = CartId::new();

        bus.publish(Publication::Event(created_envelope(cart_id, 1)));

        assert!(matches!(first.recv().await.unwrap(), Publication::Event(_)));
        assert!(matches!(second.recv().await.unwrap(), Publication::Event(_)));
    }
}
