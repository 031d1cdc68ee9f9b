//! Cart store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Cart, CartLine, CartOwner, Money, OrderError};

use crate::error::CheckoutError;

/// Trait for reading and clearing pending carts.
///
/// Cart creation and item management belong to the cart-facing API, which is
/// a separate concern; the placement workflow only snapshots and clears.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns a snapshot of the owner's cart, or None if no cart exists.
    async fn get_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, CheckoutError>;

    /// Removes every line from the owner's cart. The cart itself survives.
    async fn clear_cart(&self, owner: &CartOwner) -> Result<(), CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<CartOwner, Cart>,
    fail_on_clear: bool,
}

/// In-memory cart store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartStore {
    /// Creates a new in-memory cart store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item to the owner's cart, creating the cart lazily.
    ///
    /// Merges with an existing line for the same product and refreshes the
    /// price snapshot, matching add-to-cart semantics.
    pub fn add_item(
        &self,
        owner: &CartOwner,
        product_id: impl Into<domain::ProductId>,
        quantity: u32,
        price_snapshot: Money,
    ) -> Result<(), OrderError> {
        let line = CartLine::new(product_id, quantity, price_snapshot)?;
        let mut state = self.state.write().unwrap();
        state
            .carts
            .entry(owner.clone())
            .or_insert_with(|| Cart::new(owner.clone()))
            .upsert_line(line);
        Ok(())
    }

    /// Configures the store to fail on the next clear call.
    pub fn set_fail_on_clear(&self, fail: bool) {
        self.state.write().unwrap().fail_on_clear = fail;
    }

    /// Returns the number of lines in the owner's cart (0 if no cart).
    pub fn line_count(&self, owner: &CartOwner) -> usize {
        self.state
            .read()
            .unwrap()
            .carts
            .get(owner)
            .map(Cart::line_count)
            .unwrap_or(0)
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, CheckoutError> {
        Ok(self.state.read().unwrap().carts.get(owner).cloned())
    }

    async fn clear_cart(&self, owner: &CartOwner) -> Result<(), CheckoutError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_clear {
            return Err(CheckoutError::CartStore(
                "cart store unavailable".to_string(),
            ));
        }

        if let Some(cart) = state.carts.get_mut(owner) {
            cart.clear();
        }
        Ok(())
    }
}
