use super::value_objects::ItemId;

// ============================================================================
// Cart Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("cart already exists")]
    AlreadyCreated,

    #[error("cart does not exist yet")]
    NotCreated,

    #[error("cart is no longer open")]
    NotOpen,

    #[error("item not found in cart: {0}")]
    ItemNotFound(ItemId),

    #[error("item already in cart: {0}")]
    DuplicateItem(ItemId),

    #[error("quantity must be at least 1")]
    ZeroQuantity,

    #[error("cannot check out an empty cart")]
    EmptyCart,
}
