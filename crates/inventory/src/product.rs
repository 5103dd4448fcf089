use serde::{Deserialize, Serialize};

use agrosupply_core::{DomainError, DomainResult, Entity, Money, ProductId};

/// Input for registering a product with the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub unit_price: Money,
    pub initial_quantity: i64,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, unit_price: Money, initial_quantity: i64) -> Self {
        Self {
            name: name.into(),
            unit_price,
            initial_quantity,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if self.unit_price.is_negative() {
            return Err(DomainError::validation(format!(
                "unit price cannot be negative (got {})",
                self.unit_price
            )));
        }
        if self.initial_quantity < 0 {
            return Err(DomainError::validation(format!(
                "initial quantity cannot be negative (got {})",
                self.initial_quantity
            )));
        }
        Ok(())
    }
}

/// A stocked product.
///
/// `available_quantity` never drops below zero: every mutation goes through
/// [`Product::reserve`] or [`Product::release`], which reject the change
/// instead of applying it partially.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    unit_price: Money,
    available_quantity: i64,
}

impl Product {
    /// Build a product from a validated registration and a store-assigned id.
    pub fn register(id: ProductId, new: NewProduct) -> DomainResult<Self> {
        new.validate()?;
        Ok(Self {
            id,
            name: new.name.trim().to_string(),
            unit_price: new.unit_price,
            available_quantity: new.initial_quantity,
        })
    }

    /// Rehydrate a product from persisted columns.
    pub fn from_parts(
        id: ProductId,
        name: String,
        unit_price: Money,
        available_quantity: i64,
    ) -> DomainResult<Self> {
        if available_quantity < 0 {
            return Err(DomainError::invariant(format!(
                "product {id} persisted with negative stock {available_quantity}"
            )));
        }
        Ok(Self {
            id,
            name,
            unit_price,
            available_quantity,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn available_quantity(&self) -> i64 {
        self.available_quantity
    }

    pub fn is_in_stock(&self) -> bool {
        self.available_quantity > 0
    }

    /// Check that `qty` units could be reserved right now, without mutating.
    pub fn ensure_available(&self, qty: i64) -> DomainResult<()> {
        ensure_positive(qty)?;
        if qty > self.available_quantity {
            return Err(DomainError::InsufficientStock {
                product_id: self.id,
                requested: qty,
                available: self.available_quantity,
            });
        }
        Ok(())
    }

    /// Decrement availability by `qty`.
    pub fn reserve(&mut self, qty: i64) -> DomainResult<()> {
        self.ensure_available(qty)?;
        self.available_quantity -= qty;
        Ok(())
    }

    /// Increment availability by `qty` (restock or compensation).
    pub fn release(&mut self, qty: i64) -> DomainResult<()> {
        ensure_positive(qty)?;
        self.available_quantity = self.available_quantity.checked_add(qty).ok_or_else(|| {
            DomainError::validation(format!("stock overflow for product {}", self.id))
        })?;
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

fn ensure_positive(qty: i64) -> DomainResult<()> {
    if qty <= 0 {
        return Err(DomainError::validation(format!(
            "quantity must be positive (got {qty})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed(qty: i64) -> Product {
        Product::register(
            ProductId::new(1),
            NewProduct::new("Feed 50kg", Money::from_minor_units(4_500), qty),
        )
        .unwrap()
    }

    #[test]
    fn reserve_decrements_and_reports_shortfall() {
        let mut p = feed(5);
        p.reserve(3).unwrap();
        assert_eq!(p.available_quantity(), 2);

        let err = p.reserve(3).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                product_id: ProductId::new(1),
                requested: 3,
                available: 2
            }
        );
        assert_eq!(p.available_quantity(), 2);
    }

    #[test]
    fn zero_and_negative_quantities_are_validation_errors() {
        let mut p = feed(5);
        assert!(p.reserve(0).unwrap_err().is_validation());
        assert!(p.release(-1).unwrap_err().is_validation());
        assert_eq!(p.available_quantity(), 5);
    }

    #[test]
    fn registration_rejects_bad_input() {
        let bad_name = NewProduct::new("  ", Money::ZERO, 1);
        assert!(bad_name.validate().is_err());
        let bad_price = NewProduct::new("Salt", Money::from_minor_units(-1), 1);
        assert!(bad_price.validate().is_err());
        let bad_qty = NewProduct::new("Salt", Money::ZERO, -1);
        assert!(bad_qty.validate().is_err());
    }

    #[test]
    fn persisted_negative_stock_is_rejected() {
        let err = Product::from_parts(ProductId::new(3), "x".into(), Money::ZERO, -2).unwrap_err();
        assert_eq!(err.code(), "invariant_violation");
    }

    proptest! {
        /// Property: no sequence of reserve/release calls makes stock negative,
        /// and stock always equals initial - reserved + released.
        #[test]
        fn stock_never_goes_negative(
            initial in 0i64..1_000,
            ops in prop::collection::vec((any::<bool>(), 1i64..200), 0..60)
        ) {
            let mut p = feed(initial);
            let mut expected = initial;
            for (is_reserve, qty) in ops {
                if is_reserve {
                    if p.reserve(qty).is_ok() {
                        expected -= qty;
                    }
                } else {
                    p.release(qty).unwrap();
                    expected += qty;
                }
                prop_assert!(p.available_quantity() >= 0);
                prop_assert_eq!(p.available_quantity(), expected);
            }
        }
    }
}
