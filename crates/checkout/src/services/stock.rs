//! Stock ledger trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Money, ProductId};

use crate::error::CheckoutError;

/// Catalog view of a product, as the stock ledger exposes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// The product identifier.
    pub id: ProductId,
    /// Human-readable product name.
    pub name: String,
    /// Current live catalog price.
    pub price: Money,
    /// Units available for sale.
    pub stock_quantity: u32,
}

impl Product {
    /// Creates a new product record.
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money,
        stock_quantity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock_quantity,
        }
    }
}

/// Trait for stock read and conditional-decrement operations.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Resolves a product, or None if it is no longer in the catalog.
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, CheckoutError>;

    /// Atomically decrements stock if at least `quantity` units remain.
    ///
    /// Fails with `InsufficientStock` when the conditional check rejects, and
    /// leaves the level unchanged in that case.
    async fn decrement_stock(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CheckoutError>;

    /// Returns previously decremented stock to the ledger.
    ///
    /// Compensation hook for a placement that decremented some lines and
    /// then had to unwind.
    async fn release_stock(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryStockState {
    products: HashMap<ProductId, Product>,
    fail_on_decrement: bool,
}

/// In-memory stock ledger for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockLedger {
    state: Arc<RwLock<InMemoryStockState>>,
}

impl InMemoryStockLedger {
    /// Creates a new in-memory stock ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product in the catalog.
    pub fn add_product(&self, product: Product) {
        self.state
            .write()
            .unwrap()
            .products
            .insert(product.id.clone(), product);
    }

    /// Removes a product from the catalog.
    pub fn remove_product(&self, product_id: &ProductId) {
        self.state.write().unwrap().products.remove(product_id);
    }

    /// Updates the live price of a product.
    pub fn set_price(&self, product_id: &ProductId, price: Money) {
        if let Some(product) = self.state.write().unwrap().products.get_mut(product_id) {
            product.price = price;
        }
    }

    /// Returns the current stock level (0 for unknown products).
    pub fn stock_of(&self, product_id: &ProductId) -> u32 {
        self.state
            .read()
            .unwrap()
            .products
            .get(product_id)
            .map(|p| p.stock_quantity)
            .unwrap_or(0)
    }

    /// Configures the ledger to fail decrements with an infrastructure error.
    pub fn set_fail_on_decrement(&self, fail: bool) {
        self.state.write().unwrap().fail_on_decrement = fail;
    }
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, CheckoutError> {
        Ok(self.state.read().unwrap().products.get(product_id).cloned())
    }

    async fn decrement_stock(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CheckoutError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_decrement {
            return Err(CheckoutError::StockLedger(
                "stock ledger unavailable".to_string(),
            ));
        }

        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| CheckoutError::ProductNotFound(product_id.clone()))?;

        if product.stock_quantity < quantity {
            return Err(CheckoutError::InsufficientStock {
                product: product.name.clone(),
            });
        }

        product.stock_quantity -= quantity;
        Ok(())
    }

    async fn release_stock(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CheckoutError> {
        let mut state = self.state.write().unwrap();

        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| CheckoutError::ProductNotFound(product_id.clone()))?;

        product.stock_quantity += quantity;
        Ok(())
    }
}
