//! Shopping cart arithmetic.
//!
//! The cart lives in the visitor's session; it is a plain value with no I/O.

use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::types::{Price, ProductId};

/// A cart line. `quantity` is always at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price * self.quantity
    }
}

/// Ordered list of cart lines, at most one per product ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Add one unit of `product`, bumping the existing line if present.
    pub fn add(&mut self, product: Product) {
        self.add_quantity(product, 1);
    }

    /// Add `quantity` units of `product`. A zero quantity is ignored.
    pub fn add_quantity(&mut self, product: Product, quantity: u32) {
        if quantity == 0 {
            return;
        }
        if let Some(line) = self.line_mut(&product.id) {
            line.quantity = line.quantity.saturating_add(quantity);
        } else {
            self.items.push(CartItem { product, quantity });
        }
    }

    /// Remove the line for `product_id`, if any.
    pub fn remove(&mut self, product_id: &ProductId) {
        self.items.retain(|item| &item.product.id != product_id);
    }

    /// Set the quantity of a line. Zero or negative removes it.
    pub fn update_quantity(&mut self, product_id: &ProductId, quantity: i64) {
        if quantity <= 0 {
            self.remove(product_id);
            return;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(line) = self.line_mut(product_id) {
            line.quantity = quantity;
        }
    }

    /// Sum of price times quantity over every line.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |count, item| count.saturating_add(item.quantity))
    }

    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.items
            .iter()
            .find(|item| &item.product.id == product_id)
            .map_or(0, |item| item.quantity)
    }

    /// Product names, in cart order.
    pub fn product_names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.product.name.as_str())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn line_mut(&mut self, product_id: &ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| &item.product.id == product_id)
    }
}

impl From<Vec<CartItem>> for Cart {
    /// Builds a cart from client-supplied lines, merging duplicates and
    /// dropping zero-quantity lines.
    fn from(lines: Vec<CartItem>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            cart.add_quantity(line.product, line.quantity);
        }
        cart
    }
}
