use serde::{Deserialize, Serialize};

/// Operation-level permission.
///
/// The set is closed: one permission per externally visible fulfillment
/// operation family.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewCatalog,
    PlaceOrder,
    ViewOrders,
    AdvanceOrder,
    CancelOrder,
    AssignCarrier,
    UpdateShipment,
    ManageInventory,
}

impl Permission {
    pub const ALL: &'static [Permission] = &[
        Permission::ViewCatalog,
        Permission::PlaceOrder,
        Permission::ViewOrders,
        Permission::AdvanceOrder,
        Permission::CancelOrder,
        Permission::AssignCarrier,
        Permission::UpdateShipment,
        Permission::ManageInventory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewCatalog => "catalog.view",
            Permission::PlaceOrder => "orders.place",
            Permission::ViewOrders => "orders.view",
            Permission::AdvanceOrder => "orders.advance",
            Permission::CancelOrder => "orders.cancel",
            Permission::AssignCarrier => "shipments.assign",
            Permission::UpdateShipment => "shipments.update",
            Permission::ManageInventory => "inventory.manage",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
