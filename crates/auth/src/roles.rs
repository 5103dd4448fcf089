use core::str::FromStr;

use serde::{Deserialize, Serialize};

use agrosupply_core::DomainError;

use crate::permissions::Permission;

/// Role held by a platform user.
///
/// Every user holds exactly one role; the role decides which fulfillment
/// operations the user may drive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Places orders (the livestock farmer in the field).
    Buyer,
    /// Warehouse staff: processes orders, manages stock, dispatches.
    Warehouse,
    /// Delivers shipments assigned to them.
    Carrier,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Warehouse => "warehouse",
            Role::Carrier => "carrier",
            Role::Admin => "admin",
        }
    }

    /// Permissions granted by this role.
    pub fn grants(&self) -> &'static [Permission] {
        match self {
            Role::Buyer => &[Permission::PlaceOrder, Permission::ViewOrders, Permission::ViewCatalog],
            Role::Warehouse => &[
                Permission::ViewOrders,
                Permission::ViewCatalog,
                Permission::AdvanceOrder,
                Permission::CancelOrder,
                Permission::AssignCarrier,
                Permission::ManageInventory,
            ],
            Role::Carrier => &[Permission::ViewOrders, Permission::UpdateShipment],
            // Orders need a buyer, so admins cannot place them.
            Role::Admin => &[
                Permission::ViewCatalog,
                Permission::ViewOrders,
                Permission::AdvanceOrder,
                Permission::CancelOrder,
                Permission::AssignCarrier,
                Permission::UpdateShipment,
                Permission::ManageInventory,
            ],
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.grants().contains(&permission)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyer" => Ok(Role::Buyer),
            "warehouse" => Ok(Role::Warehouse),
            "carrier" => Ok(Role::Carrier),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::validation(format!(
                "unknown role '{other}' (expected buyer, warehouse, carrier or admin)"
            ))),
        }
    }
}
