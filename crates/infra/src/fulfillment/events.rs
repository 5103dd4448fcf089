//! Notifications emitted after committed fulfillment state changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agrosupply_core::{Money, OrderId, ProductId, ShipmentId, UserId};
use agrosupply_events::{Event, EventEnvelope};
use agrosupply_orders::OrderStatus;
use agrosupply_shipping::ShipmentStatus;

pub type FulfillmentEnvelope = EventEnvelope<FulfillmentEvent>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FulfillmentEvent {
    OrderPlaced {
        order_id: OrderId,
        buyer_id: UserId,
        total: Money,
        line_count: usize,
        occurred_at: DateTime<Utc>,
    },
    OrderStatusChanged {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        occurred_at: DateTime<Utc>,
    },
    ShipmentAssigned {
        shipment_id: ShipmentId,
        order_id: OrderId,
        carrier_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    ShipmentStatusChanged {
        shipment_id: ShipmentId,
        order_id: OrderId,
        from: ShipmentStatus,
        to: ShipmentStatus,
        occurred_at: DateTime<Utc>,
    },
    StockReleased {
        product_id: ProductId,
        quantity: i64,
        available: i64,
        occurred_at: DateTime<Utc>,
    },
}

impl FulfillmentEvent {
    /// The record this event is about, as `(subject_type, subject_id)`.
    pub fn subject(&self) -> (&'static str, i64) {
        match self {
            FulfillmentEvent::OrderPlaced { order_id, .. }
            | FulfillmentEvent::OrderStatusChanged { order_id, .. } => ("order", order_id.get()),
            FulfillmentEvent::ShipmentAssigned { shipment_id, .. }
            | FulfillmentEvent::ShipmentStatusChanged { shipment_id, .. } => {
                ("shipment", shipment_id.get())
            }
            FulfillmentEvent::StockReleased { product_id, .. } => ("product", product_id.get()),
        }
    }

    pub fn into_envelope(self) -> FulfillmentEnvelope {
        let (subject_type, subject_id) = self.subject();
        EventEnvelope::wrap(subject_type, subject_id, self)
    }
}

impl Event for FulfillmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FulfillmentEvent::OrderPlaced { .. } => "order.placed",
            FulfillmentEvent::OrderStatusChanged { .. } => "order.status_changed",
            FulfillmentEvent::ShipmentAssigned { .. } => "shipment.assigned",
            FulfillmentEvent::ShipmentStatusChanged { .. } => "shipment.status_changed",
            FulfillmentEvent::StockReleased { .. } => "inventory.stock_released",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            FulfillmentEvent::OrderPlaced { occurred_at, .. }
            | FulfillmentEvent::OrderStatusChanged { occurred_at, .. }
            | FulfillmentEvent::ShipmentAssigned { occurred_at, .. }
            | FulfillmentEvent::ShipmentStatusChanged { occurred_at, .. }
            | FulfillmentEvent::StockReleased { occurred_at, .. } => *occurred_at,
        }
    }
}
