//! Cart snapshot types consumed by order placement.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

use super::{Money, OrderError, ProductId};

/// The owner of a cart: a registered user or an anonymous browser session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CartOwner {
    /// Cart belongs to an authenticated user.
    User(UserId),

    /// Cart belongs to an anonymous session.
    Session(String),
}

impl std::fmt::Display for CartOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartOwner::User(id) => write!(f, "user:{id}"),
            CartOwner::Session(id) => write!(f, "session:{id}"),
        }
    }
}

/// One product entry in a pending cart.
///
/// `price_snapshot` is the unit price captured when the item was added or
/// last updated; order placement bills from it rather than the live catalog
/// price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The product in the cart.
    pub product_id: ProductId,

    /// Quantity requested. Always at least one.
    pub quantity: u32,

    /// Unit price at add/update time.
    pub price_snapshot: Money,
}

impl CartLine {
    /// Creates a new cart line.
    ///
    /// Fails with `InvalidQuantity` when `quantity` is zero and with
    /// `InvalidPrice` when the snapshot is not positive.
    pub fn new(
        product_id: impl Into<ProductId>,
        quantity: u32,
        price_snapshot: Money,
    ) -> Result<Self, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity });
        }
        if !price_snapshot.is_positive() {
            return Err(OrderError::InvalidPrice {
                price: price_snapshot.cents(),
            });
        }

        Ok(Self {
            product_id: product_id.into(),
            quantity,
            price_snapshot,
        })
    }

    /// Returns the billed total for this line (quantity * price snapshot).
    pub fn line_total(&self) -> Money {
        self.price_snapshot.multiply(self.quantity)
    }
}

/// A pending cart: the owner plus its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    owner: CartOwner,
    lines: Vec<CartLine>,
    created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for the given owner.
    pub fn new(owner: CartOwner) -> Self {
        Self {
            owner,
            lines: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Returns the cart owner.
    pub fn owner(&self) -> &CartOwner {
        &self.owner
    }

    /// Returns the cart lines.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Returns the number of lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns when the cart was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the billed total across all lines.
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Adds a line, merging with an existing line for the same product.
    ///
    /// Merging adds quantities and refreshes the price snapshot to the new
    /// line's value, matching add-to-cart semantics.
    pub fn upsert_line(&mut self, line: CartLine) {
        match self
            .lines
            .iter_mut()
            .find(|existing| existing.product_id == line.product_id)
        {
            Some(existing) => {
                existing.quantity += line.quantity;
                existing.price_snapshot = line.price_snapshot;
            }
            None => self.lines.push(line),
        }
    }

    /// Removes every line. The cart itself survives.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
