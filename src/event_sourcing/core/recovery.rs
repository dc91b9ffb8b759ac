use super::aggregate::Aggregate;
use crate::event_sourcing::store::{Journal, JournalError};

// ============================================================================
// Recovery - State Reconstruction From History
// ============================================================================
//
// Replays all persisted events for one identity in ascending sequence
// order and folds them through `apply`. Runs before an aggregate instance
// accepts its first live command, and after every passivation.
//
// A gap or out-of-order record in the history is a data-integrity error:
// it is surfaced loudly, never skipped or reordered.
//
// ============================================================================

/// Result of a successful replay: reconstructed state plus the sequence
/// number of the last event folded in (0 for an empty history).
#[derive(Debug, Clone)]
pub struct Recovered<A: Aggregate> {
    pub state: A,
    pub sequence_number: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RecoveryError {
    #[error("corrupt event history for {aggregate_id}: expected sequence {expected}, found {found}")]
    SequenceGap {
        aggregate_id: String,
        expected: u64,
        found: u64,
    },

    #[error("storage failure during replay: {0}")]
    Storage(String),
}

/// Rebuild state and sequence number for `aggregate_id` from the journal.
///
/// An empty history is a valid outcome (brand-new identity): state is the
/// type's default and the sequence number is 0.
pub async fn replay<A: Aggregate>(
    journal: &dyn Journal<A>,
    aggregate_id: &A::Id,
) -> Result<Recovered<A>, RecoveryError> {
    let envelopes = journal.read(aggregate_id).await.map_err(|e| match e {
        JournalError::Storage(msg) => RecoveryError::Storage(msg),
        other => RecoveryError::Storage(other.to_string()),
    })?;

    let mut state = A::default();
    let mut sequence_number = 0u64;

    for envelope in &envelopes {
        let expected = sequence_number + 1;
        if envelope.sequence_number != expected {
            return Err(RecoveryError::SequenceGap {
                aggregate_id: aggregate_id.to_string(),
                expected,
                found: envelope.sequence_number,
            });
        }
        state.apply(&envelope.event);
        sequence_number = expected;
    }

    tracing::debug!(
        aggregate_type = A::AGGREGATE_TYPE,
        aggregate_id = %aggregate_id,
        sequence_number,
        replayed = envelopes.len(),
        "aggregate state reconstructed"
    );

    Ok(Recovered {
        state,
        sequence_number,
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::domain::cart::{
        CartAggregate, CartCreated, CartEvent, CartId, CartItemAdded, ItemId, LineItem, Sku,
    };
    use crate::event_sourcing::core::event::EventEnvelope;
    use crate::event_sourcing::store::InMemoryJournal;

    fn line_item(quantity: u32) -> LineItem {
        LineItem {
            item_id: ItemId::new(),
            sku: Sku::new("SKU-0001"),
            quantity,
        }
    }

    /// Journal stub that returns a canned history, used to feed replay
    /// histories the real journal would refuse to append.
    struct CannedJournal {
        envelopes: Vec<EventEnvelope<CartAggregate>>,
    }

    #[async_trait]
    impl Journal<CartAggregate> for CannedJournal {
        async fn append(
            &self,
            _aggregate_id: &CartId,
            _envelopes: &[EventEnvelope<CartAggregate>],
            _expected_sequence: u64,
        ) -> Result<u64, JournalError> {
            unimplemented!("read-only stub")
        }

        async fn read(
            &self,
            _aggregate_id: &CartId,
        ) -> Result<Vec<EventEnvelope<CartAggregate>>, JournalError> {
            Ok(self.envelopes.clone())
        }

        async fn read_from(
            &self,
            _aggregate_id: &CartId,
            from_sequence: u64,
        ) -> Result<Vec<EventEnvelope<CartAggregate>>, JournalError> {
            Ok(self
                .envelopes
                .iter()
                .filter(|e| e.sequence_number > from_sequence)
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn replay_empty_history_yields_default_state_at_sequence_zero() {
        let journal = InMemoryJournal::<CartAggregate>::new();
        let cart_id = CartId::new();

        let recovered = replay(&journal, &cart_id).await.unwrap();

        assert_eq!(recovered.sequence_number, 0);
        assert_eq!(recovered.state, CartAggregate::default());
    }

    #[tokio::test]
    async fn replay_folds_events_in_order() {
        let journal = InMemoryJournal::<CartAggregate>::new();
        let cart_id = CartId::new();

        let created = EventEnvelope::new(cart_id, 1, CartEvent::Created(CartCreated { cart_id }));
        let added = EventEnvelope::new(
            cart_id,
            2,
            CartEvent::ItemAdded(CartItemAdded {
                item: line_item(2),
            }),
        );
        journal.append(&cart_id, &[created], 0).await.unwrap();
        journal.append(&cart_id, &[added], 1).await.unwrap();

        let recovered = replay(&journal, &cart_id).await.unwrap();

        assert_eq!(recovered.sequence_number, 2);
        assert_eq!(recovered.state.item_count(), 1);
        assert_eq!(recovered.state.cart_id, Some(cart_id));
    }

    #[tokio::test]
    async fn replay_detects_sequence_gap() {
        let cart_id = CartId::new();
        let journal = CannedJournal {
            envelopes: vec![
                EventEnvelope::new(cart_id, 1, CartEvent::Created(CartCreated { cart_id })),
                EventEnvelope::new(
                    cart_id,
                    3,
                    CartEvent::ItemAdded(CartItemAdded {
                        item: line_item(1),
                    }),
                ),
            ],
        };

        let result = replay(&journal, &cart_id).await;

        assert!(matches!(
            result,
            Err(RecoveryError::SequenceGap {
                expected: 2,
                found: 3,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn replay_detects_out_of_order_records() {
        let cart_id = CartId::new();
        let journal = CannedJournal {
            envelopes: vec![
                EventEnvelope::new(cart_id, 1, CartEvent::Created(CartCreated { cart_id })),
                EventEnvelope::new(
                    cart_id,
                    2,
                    CartEvent::ItemAdded(CartItemAdded {
                        item: line_item(1),
                    }),
                ),
                EventEnvelope::new(
                    cart_id,
                    2,
                    CartEvent::ItemAdded(CartItemAdded {
                        item: line_item(4),
                    }),
                ),
            ],
        };

        let result = replay(&journal, &cart_id).await;

        assert!(matches!(
            result,
            Err(RecoveryError::SequenceGap {
                expected: 3,
                found: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn replay_is_deterministic_across_repeats() {
        let journal = InMemoryJournal::<CartAggregate>::new();
        let cart_id = CartId::new();

        let mut sequence = 0u64;
        let created = EventEnvelope::new(cart_id, 1, CartEvent::Created(CartCreated { cart_id }));
        journal.append(&cart_id, &[created], sequence).await.unwrap();
        sequence = 1;
        for _ in 0..5 {
            let envelope = EventEnvelope::new(
                cart_id,
                sequence + 1,
                CartEvent::ItemAdded(CartItemAdded {
                    item: line_item(1),
                }),
            );
            journal.append(&cart_id, &[envelope], sequence).await.unwrap();
            sequence += 1;
        }

        let first = replay(&journal, &cart_id).await.unwrap();
        let second = replay(&journal, &cart_id).await.unwrap();

        assert_eq!(first.sequence_number, second.sequence_number);
        assert_eq!(first.state, second.state);
        assert_eq!(first.state.item_count(), 5);
    }
}
