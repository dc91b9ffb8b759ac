use super::value_objects::{CartId, ItemId, LineItem};

// ============================================================================
// Cart Domain Commands
// ============================================================================

#[derive(Debug, Clone)]
pub enum CartCommand {
    CreateCart {
        cart_id: CartId,
    },
    AddItem {
        item: LineItem,
    },
    RemoveItem {
        item_id: ItemId,
    },
    ChangeQuantity {
        item_id: ItemId,
        quantity: u32,
    },
    Checkout,
}
