use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agrosupply_core::{DomainError, DomainResult, Entity, Money, OrderId, ProductId, UserId};

/// Order status lifecycle.
///
/// `Placed -> Processed -> Shipped -> Delivered`, with `Cancelled` reachable
/// from `Placed` or `Processed`. Nothing moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Processed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Placed,
        OrderStatus::Processed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Processed => "processed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Placed, Processed)
                | (Placed, Cancelled)
                | (Processed, Shipped)
                | (Processed, Cancelled)
                | (Shipped, Delivered)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// True while a shipment must exist for the order.
    pub fn requires_shipment(&self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Delivered)
    }

    pub fn ensure_transition(&self, target: OrderStatus) -> DomainResult<()> {
        if self.can_transition_to(target) {
            Ok(())
        } else {
            Err(DomainError::invalid_transition(
                "order",
                self.as_str(),
                target.as_str(),
            ))
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == wanted)
            .ok_or_else(|| DomainError::validation(format!("unknown order status '{s}'")))
    }
}

/// A requested line before the order exists: product, quantity, and the unit
/// price snapshotted when the product entered the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl LineRequest {
    pub fn new(product_id: ProductId, quantity: i64, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "quantity for product {} must be positive (got {})",
                self.product_id, self.quantity
            )));
        }
        if self.unit_price.is_negative() {
            return Err(DomainError::validation(format!(
                "unit price for product {} cannot be negative (got {})",
                self.product_id, self.unit_price
            )));
        }
        Ok(())
    }
}

/// Order line: product, quantity, unit price at time of purchase. Immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn subtotal(&self) -> DomainResult<Money> {
        self.unit_price.times(self.quantity)
    }
}

/// A validated order that has not been assigned an id yet.
///
/// Holding an `OrderDraft` proves the lines are non-empty, every quantity is
/// positive, every price is non-negative, and the total is the exact sum of
/// the line subtotals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    buyer_id: UserId,
    lines: Vec<LineRequest>,
    total: Money,
}

impl OrderDraft {
    pub fn new(buyer_id: UserId, lines: Vec<LineRequest>) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::EmptyCart);
        }
        for line in &lines {
            line.validate()?;
        }
        let total = Money::sum(
            lines
                .iter()
                .map(|l| l.unit_price.times(l.quantity))
                .collect::<DomainResult<Vec<_>>>()?,
        )?;
        Ok(Self {
            buyer_id,
            lines,
            total,
        })
    }

    pub fn buyer_id(&self) -> UserId {
        self.buyer_id
    }

    pub fn lines(&self) -> &[LineRequest] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    /// Materialize the order (status `Placed`) and its numbered lines.
    pub fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> (Order, Vec<OrderLine>) {
        let lines = self
            .lines
            .iter()
            .zip(1u32..)
            .map(|(l, line_no)| OrderLine {
                order_id: id,
                line_no,
                product_id: l.product_id,
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect();
        let order = Order {
            id,
            buyer_id: self.buyer_id,
            created_at,
            status: OrderStatus::Placed,
            total: self.total,
        };
        (order, lines)
    }
}

/// Order header. `status` is the only field that changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    buyer_id: UserId,
    created_at: DateTime<Utc>,
    status: OrderStatus,
    total: Money,
}

impl Order {
    /// Rehydrate an order from persisted columns.
    pub fn from_parts(
        id: OrderId,
        buyer_id: UserId,
        created_at: DateTime<Utc>,
        status: OrderStatus,
        total: Money,
    ) -> Self {
        Self {
            id,
            buyer_id,
            created_at,
            status,
            total,
        }
    }

    pub fn buyer_id(&self) -> UserId {
        self.buyer_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total(&self) -> Money {
        self.total
    }

    /// Move to `target` if the lifecycle allows it; the order is untouched on error.
    pub fn transition_to(&mut self, target: OrderStatus) -> DomainResult<OrderStatus> {
        self.status.ensure_transition(target)?;
        let from = self.status;
        self.status = target;
        Ok(from)
    }

    /// Check that `lines` add up to the stored total.
    pub fn verify_total(&self, lines: &[OrderLine]) -> DomainResult<()> {
        let sum = Money::sum(
            lines
                .iter()
                .map(OrderLine::subtotal)
                .collect::<DomainResult<Vec<_>>>()?,
        )?;
        if sum != self.total {
            return Err(DomainError::invariant(format!(
                "order {} total {} does not match line sum {}",
                self.id, self.total, sum
            )));
        }
        Ok(())
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
