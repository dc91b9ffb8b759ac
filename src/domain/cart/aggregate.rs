use std::collections::HashMap;

use super::commands::CartCommand;
use super::errors::CartError;
use super::events::*;
use super::value_objects::{CartId, CartStatus, ItemId, LineItem};
use crate::event_sourcing::Aggregate;

// ============================================================================
// Cart Aggregate - Business Logic
// ============================================================================

/// Shopping cart reconstructed from its event history.
///
/// `cart_id` is `None` until the creation event is applied; the default
/// value is the valid zero-event state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartAggregate {
    pub cart_id: Option<CartId>,
    pub status: CartStatus,
    pub items: HashMap<ItemId, LineItem>,
}

impl CartAggregate {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.values().map(|item| item.quantity).sum()
    }

    fn created(&self) -> bool {
        self.cart_id.is_some()
    }

    fn validate_open(&self) -> Result<(), CartError> {
        if !self.created() {
            return Err(CartError::NotCreated);
        }
        match self.status {
            CartStatus::Open => Ok(()),
            CartStatus::CheckedOut => Err(CartError::NotOpen),
        }
    }
}

impl Aggregate for CartAggregate {
    type Id = CartId;
    type Command = CartCommand;
    type Event = CartEvent;
    type Error = CartError;

    const AGGREGATE_TYPE: &'static str = "Cart";

    fn handle_command(&self, command: &CartCommand) -> Result<Vec<CartEvent>, CartError> {
        match command {
            CartCommand::CreateCart { cart_id } => {
                if self.created() {
                    return Err(CartError::AlreadyCreated);
                }

                Ok(vec![CartEvent::Created(CartCreated { cart_id: *cart_id })])
            }

            CartCommand::AddItem { item } => {
                self.validate_open()?;

                if item.quantity == 0 {
                    return Err(CartError::ZeroQuantity);
                }
                if self.items.contains_key(&item.item_id) {
                    return Err(CartError::DuplicateItem(item.item_id));
                }

                Ok(vec![CartEvent::ItemAdded(CartItemAdded {
                    item: item.clone(),
                })])
            }

            CartCommand::RemoveItem { item_id } => {
                self.validate_open()?;

                if !self.items.contains_key(item_id) {
                    return Err(CartError::ItemNotFound(*item_id));
                }

                Ok(vec![CartEvent::ItemRemoved(CartItemRemoved {
                    item_id: *item_id,
                })])
            }

            CartCommand::ChangeQuantity { item_id, quantity } => {
                self.validate_open()?;

                if *quantity == 0 {
                    return Err(CartError::ZeroQuantity);
                }
                match self.items.get(item_id) {
                    None => Err(CartError::ItemNotFound(*item_id)),
                    // Already at that quantity: accepted, nothing to record.
                    Some(existing) if existing.quantity == *quantity => Ok(vec![]),
                    Some(_) => Ok(vec![CartEvent::QuantityChanged(CartItemQuantityChanged {
                        item_id: *item_id,
                        quantity: *quantity,
                    })]),
                }
            }

            CartCommand::Checkout => {
                self.validate_open()?;

                if self.items.is_empty() {
                    return Err(CartError::EmptyCart);
                }

                Ok(vec![CartEvent::CheckedOut(CartCheckedOut {
                    total_quantity: self.total_quantity(),
                })])
            }
        }
    }

    fn apply(&mut self, event: &CartEvent) {
        match event {
            CartEvent::Created(e) => {
                self.cart_id = Some(e.cart_id);
                self.status = CartStatus::Open;
            }
            CartEvent::ItemAdded(e) => {
                self.items.insert(e.item.item_id, e.item.clone());
            }
            CartEvent::ItemRemoved(e) => {
                self.items.remove(&e.item_id);
            }
            CartEvent::QuantityChanged(e) => {
                if let Some(item) = self.items.get_mut(&e.item_id) {
                    item.quantity = e.quantity;
                }
            }
            CartEvent::CheckedOut(_) => {
                self.status = CartStatus::CheckedOut;
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cart::value_objects::Sku;

    fn created_cart() -> (CartId, CartAggregate) {
        let cart_id = CartId::new();
        let mut aggregate = CartAggregate::default();
        aggregate.apply(&CartEvent::Created(CartCreated { cart_id }));
        (cart_id, aggregate)
    }

    fn test_item(quantity: u32) -> LineItem {
        LineItem {
            item_id: ItemId::new(),
            sku: Sku::new("SKU-1000"),
            quantity,
        }
    }

    #[test]
    fn default_state_is_uncreated_and_empty() {
        let aggregate = CartAggregate::default();
        assert_eq!(aggregate.cart_id, None);
        assert_eq!(aggregate.status, CartStatus::Open);
        assert_eq!(aggregate.item_count(), 0);
    }

    #[test]
    fn create_cart_emits_created_event() {
        let aggregate = CartAggregate::default();
        let cart_id = CartId::new();

        let events = aggregate
            .handle_command(&CartCommand::CreateCart { cart_id })
            .unwrap();

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            CartEvent::Created(CartCreated { cart_id: id }) if id == cart_id
        ));
    }

    #[test]
    fn duplicate_creation_is_rejected() {
        let (_, aggregate) = created_cart();

        let result = aggregate.handle_command(&CartCommand::CreateCart {
            cart_id: CartId::new(),
        });

        assert_eq!(result.unwrap_err(), CartError::AlreadyCreated);
    }

    #[test]
    fn commands_before_creation_are_rejected() {
        let aggregate = CartAggregate::default();

        let result = aggregate.handle_command(&CartCommand::AddItem {
            item: test_item(1),
        });

        assert_eq!(result.unwrap_err(), CartError::NotCreated);
    }

    #[test]
    fn add_item_emits_event_with_payload() {
        let (_, aggregate) = created_cart();
        let item = test_item(2);

        let events = aggregate
            .handle_command(&CartCommand::AddItem { item: item.clone() })
            .unwrap();

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            CartEvent::ItemAdded(CartItemAdded { item: added }) if *added == item
        ));
    }

    #[test]
    fn apply_item_added_inserts_child_entity() {
        let (_, mut aggregate) = created_cart();
        let item = test_item(3);

        aggregate.apply(&CartEvent::ItemAdded(CartItemAdded { item: item.clone() }));

        assert_eq!(aggregate.item_count(), 1);
        assert_eq!(aggregate.items.get(&item.item_id), Some(&item));
    }

    #[test]
    fn adding_same_item_twice_is_rejected() {
        let (_, mut aggregate) = created_cart();
        let item = test_item(1);
        aggregate.apply(&CartEvent::ItemAdded(CartItemAdded { item: item.clone() }));

        let result = aggregate.handle_command(&CartCommand::AddItem { item: item.clone() });

        assert_eq!(result.unwrap_err(), CartError::DuplicateItem(item.item_id));
    }

    #[test]
    fn zero_quantity_add_is_rejected() {
        let (_, aggregate) = created_cart();

        let result = aggregate.handle_command(&CartCommand::AddItem {
            item: test_item(0),
        });

        assert_eq!(result.unwrap_err(), CartError::ZeroQuantity);
    }

    #[test]
    fn remove_item_round_trips() {
        let (_, mut aggregate) = created_cart();
        let item = test_item(1);
        aggregate.apply(&CartEvent::ItemAdded(CartItemAdded { item: item.clone() }));

        let events = aggregate
            .handle_command(&CartCommand::RemoveItem {
                item_id: item.item_id,
            })
            .unwrap();
        assert_eq!(events.len(), 1);

        aggregate.apply(&events[0]);
        assert_eq!(aggregate.item_count(), 0);
    }

    #[test]
    fn removing_unknown_item_is_rejected() {
        let (_, aggregate) = created_cart();
        let item_id = ItemId::new();

        let result = aggregate.handle_command(&CartCommand::RemoveItem { item_id });

        assert_eq!(result.unwrap_err(), CartError::ItemNotFound(item_id));
    }

    #[test]
    fn change_quantity_updates_child_entity() {
        let (_, mut aggregate) = created_cart();
        let item = test_item(1);
        aggregate.apply(&CartEvent::ItemAdded(CartItemAdded { item: item.clone() }));

        let events = aggregate
            .handle_command(&CartCommand::ChangeQuantity {
                item_id: item.item_id,
                quantity: 4,
            })
            .unwrap();
        aggregate.apply(&events[0]);

        assert_eq!(aggregate.items.get(&item.item_id).unwrap().quantity, 4);
        assert_eq!(aggregate.total_quantity(), 4);
    }

    #[test]
    fn change_to_current_quantity_is_an_accepted_noop() {
        let (_, mut aggregate) = created_cart();
        let item = test_item(2);
        aggregate.apply(&CartEvent::ItemAdded(CartItemAdded { item: item.clone() }));

        let events = aggregate
            .handle_command(&CartCommand::ChangeQuantity {
                item_id: item.item_id,
                quantity: 2,
            })
            .unwrap();

        assert!(events.is_empty());
    }

    #[test]
    fn checkout_empty_cart_is_rejected() {
        let (_, aggregate) = created_cart();

        let result = aggregate.handle_command(&CartCommand::Checkout);

        assert_eq!(result.unwrap_err(), CartError::EmptyCart);
    }

    #[test]
    fn checkout_closes_the_cart() {
        let (_, mut aggregate) = created_cart();
        aggregate.apply(&CartEvent::ItemAdded(CartItemAdded {
            item: test_item(3),
        }));

        let events = aggregate.handle_command(&CartCommand::Checkout).unwrap();
        assert!(matches!(
            events[0],
            CartEvent::CheckedOut(CartCheckedOut { total_quantity: 3 })
        ));

        aggregate.apply(&events[0]);
        assert_eq!(aggregate.status, CartStatus::CheckedOut);
    }

    #[test]
    fn commands_after_checkout_are_rejected() {
        let (_, mut aggregate) = created_cart();
        aggregate.apply(&CartEvent::ItemAdded(CartItemAdded {
            item: test_item(1),
        }));
        aggregate.apply(&CartEvent::CheckedOut(CartCheckedOut { total_quantity: 1 }));

        let result = aggregate.handle_command(&CartCommand::AddItem {
            item: test_item(1),
        });

        assert_eq!(result.unwrap_err(), CartError::NotOpen);
    }

    #[test]
    fn folding_full_history_reconstructs_state() {
        let cart_id = CartId::new();
        let first = test_item(1);
        let second = test_item(5);

        let history = vec![
            CartEvent::Created(CartCreated { cart_id }),
            CartEvent::ItemAdded(CartItemAdded {
                item: first.clone(),
            }),
            CartEvent::ItemAdded(CartItemAdded {
                item: second.clone(),
            }),
            CartEvent::QuantityChanged(CartItemQuantityChanged {
                item_id: first.item_id,
                quantity: 2,
            }),
            CartEvent::ItemRemoved(CartItemRemoved {
                item_id: second.item_id,
            }),
        ];

        let mut aggregate = CartAggregate::default();
        for event in &history {
            aggregate.apply(event);
        }

        assert_eq!(aggregate.cart_id, Some(cart_id));
        assert_eq!(aggregate.item_count(), 1);
        assert_eq!(aggregate.items.get(&first.item_id).unwrap().quantity, 2);
        assert_eq!(aggregate.status, CartStatus::Open);
    }

    #[test]
    fn folding_is_deterministic() {
        let cart_id = CartId::new();
        let history: Vec<CartEvent> = std::iter::once(CartEvent::Created(CartCreated { cart_id }))
            .chain((0u32..5).map(|i| {
                CartEvent::ItemAdded(CartItemAdded {
                    item: LineItem {
                        item_id: ItemId::new(),
                        sku: Sku::new(format!("SKU-{i}")),
                        quantity: i + 1,
                    },
                })
            }))
            .collect();

        let mut first = CartAggregate::default();
        let mut second = CartAggregate::default();
        for event in &history {
            first.apply(event);
        }
        for event in &history {
            second.apply(event);
        }

        assert_eq!(first, second);
        assert_eq!(first.item_count(), 5);
    }
}
