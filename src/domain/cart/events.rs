use serde::{Deserialize, Serialize};

use super::value_objects::{CartId, ItemId, LineItem};
use crate::event_sourcing::DomainEvent;

// ============================================================================
// Cart Domain Events
// ============================================================================

/// Union type for all cart events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    Created(CartCreated),
    ItemAdded(CartItemAdded),
    ItemRemoved(CartItemRemoved),
    QuantityChanged(CartItemQuantityChanged),
    CheckedOut(CartCheckedOut),
}

impl DomainEvent for CartEvent {
    fn event_name(&self) -> &'static str {
        match self {
            CartEvent::Created(_) => "CartCreated",
            CartEvent::ItemAdded(_) => "CartItemAdded",
            CartEvent::ItemRemoved(_) => "CartItemRemoved",
            CartEvent::QuantityChanged(_) => "CartItemQuantityChanged",
            CartEvent::CheckedOut(_) => "CartCheckedOut",
        }
    }
}

// Individual event types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCreated {
    pub cart_id: CartId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemAdded {
    pub item: LineItem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemRemoved {
    pub item_id: ItemId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemQuantityChanged {
    pub item_id: ItemId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCheckedOut {
    pub total_quantity: u32,
}
