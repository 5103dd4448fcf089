//! Buyer cart held in session memory. Never persisted.

use serde::{Deserialize, Serialize};

use agrosupply_core::{DomainError, DomainResult, Entity, Money, ProductId};
use agrosupply_inventory::Product;

use crate::order::LineRequest;

/// A product in the cart with the name and price captured when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl CartLine {
    pub fn subtotal(&self) -> DomainResult<Money> {
        self.unit_price.times(self.quantity)
    }

    pub fn to_request(&self) -> LineRequest {
        LineRequest::new(self.product_id, self.quantity, self.unit_price)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `qty` units of `product`, merging with an existing line for it.
    ///
    /// The merged quantity may not exceed the stock visible on `product`.
    /// When merging, the price snapshot of the first add is kept.
    pub fn add(&mut self, product: &Product, qty: i64) -> DomainResult<()> {
        if qty <= 0 {
            return Err(DomainError::validation(format!(
                "quantity must be positive (got {qty})"
            )));
        }
        let already = self
            .lines
            .iter()
            .find(|l| l.product_id == product.id())
            .map(|l| l.quantity)
            .unwrap_or(0);
        let wanted = already
            .checked_add(qty)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        product.ensure_available(wanted)?;

        match self.lines.iter_mut().find(|l| l.product_id == product.id()) {
            Some(line) => line.quantity = wanted,
            None => self.lines.push(CartLine {
                product_id: product.id(),
                name: product.name().to_string(),
                quantity: qty,
                unit_price: product.unit_price(),
            }),
        }
        Ok(())
    }

    /// Drop the line for `product_id`. Returns whether a line was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total(&self) -> DomainResult<Money> {
        Money::sum(
            self.lines
                .iter()
                .map(CartLine::subtotal)
                .collect::<DomainResult<Vec<_>>>()?,
        )
    }

    pub fn to_requests(&self) -> Vec<LineRequest> {
        self.lines.iter().map(CartLine::to_request).collect()
    }
}
