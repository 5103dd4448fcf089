use serde::Deserialize;

use agrosupply_core::{Entity, Money, ProductId};
use agrosupply_infra::fulfillment::{OrderDetail, ShipmentUpdate};
use agrosupply_inventory::{NewProduct, Product};
use agrosupply_orders::{Order, OrderLine};
use agrosupply_shipping::Shipment;

// -------------------------
// Request DTOs
// -------------------------

/// Buyers name products and quantities only; prices come from the catalog.
#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: i64,
    pub quantity: i64,
}

impl OrderLineRequest {
    pub fn product_id(&self) -> ProductId {
        ProductId::new(self.product_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignCarrierRequest {
    pub carrier_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ShipmentStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    pub name: String,
    pub unit_price: i64,
    #[serde(default)]
    pub initial_quantity: i64,
}

impl RegisterProductRequest {
    pub fn into_new_product(self) -> NewProduct {
        NewProduct::new(self.name, Money::from_minor_units(self.unit_price), self.initial_quantity)
    }
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    pub in_stock: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
    pub buyer_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShipmentsQuery {
    pub carrier_id: Option<i64>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

fn money_to_json(amount: Money) -> serde_json::Value {
    serde_json::json!({
        "minor_units": amount.minor_units(),
        "display": amount.to_string(),
    })
}

pub fn order_to_json(order: &Order) -> serde_json::Value {
    serde_json::json!({
        "id": order.id().get(),
        "buyer_id": order.buyer_id().get(),
        "status": order.status().as_str(),
        "total": money_to_json(order.total()),
        "created_at": order.created_at().to_rfc3339(),
    })
}

pub fn line_to_json(line: &OrderLine) -> serde_json::Value {
    let subtotal = line.subtotal().map(money_to_json).unwrap_or(serde_json::Value::Null);
    serde_json::json!({
        "line_no": line.line_no,
        "product_id": line.product_id.get(),
        "quantity": line.quantity,
        "unit_price": money_to_json(line.unit_price),
        "subtotal": subtotal,
    })
}

pub fn shipment_to_json(shipment: &Shipment) -> serde_json::Value {
    serde_json::json!({
        "id": shipment.id().get(),
        "order_id": shipment.order_id().get(),
        "carrier_id": shipment.carrier_id().get(),
        "status": shipment.status().as_str(),
        "assigned_at": shipment.assigned_at().to_rfc3339(),
        "delivered_at": shipment.delivered_at().map(|t| t.to_rfc3339()),
    })
}

pub fn detail_to_json(detail: &OrderDetail) -> serde_json::Value {
    serde_json::json!({
        "order": order_to_json(&detail.order),
        "lines": detail.lines.iter().map(line_to_json).collect::<Vec<_>>(),
        "shipment": detail.shipment.as_ref().map(shipment_to_json),
    })
}

pub fn shipment_update_to_json(update: &ShipmentUpdate) -> serde_json::Value {
    serde_json::json!({
        "shipment": shipment_to_json(&update.shipment),
        "order_status": update.order_status.as_str(),
    })
}

pub fn product_to_json(product: &Product) -> serde_json::Value {
    serde_json::json!({
        "id": product.id().get(),
        "name": product.name(),
        "unit_price": money_to_json(product.unit_price()),
        "available_quantity": product.available_quantity(),
    })
}
