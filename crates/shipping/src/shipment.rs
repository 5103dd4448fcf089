use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agrosupply_core::{DomainError, DomainResult, Entity, OrderId, ShipmentId, UserId};

/// Delivery sub-status of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Preparing,
    EnRoute,
    Delivered,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 3] = [
        ShipmentStatus::Preparing,
        ShipmentStatus::EnRoute,
        ShipmentStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Preparing => "preparing",
            ShipmentStatus::EnRoute => "en_route",
            ShipmentStatus::Delivered => "delivered",
        }
    }

    /// One step forward only: no skipping, no reverse.
    pub fn can_transition_to(&self, target: ShipmentStatus) -> bool {
        matches!(
            (self, target),
            (ShipmentStatus::Preparing, ShipmentStatus::EnRoute)
                | (ShipmentStatus::EnRoute, ShipmentStatus::Delivered)
        )
    }
}

impl core::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == wanted)
            .ok_or_else(|| DomainError::validation(format!("unknown shipment status '{s}'")))
    }
}

/// Shipment linking one order to one carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    id: ShipmentId,
    order_id: OrderId,
    carrier_id: UserId,
    status: ShipmentStatus,
    assigned_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

impl Shipment {
    /// A freshly assigned shipment, in `Preparing`.
    pub fn assign(
        id: ShipmentId,
        order_id: OrderId,
        carrier_id: UserId,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_id,
            carrier_id,
            status: ShipmentStatus::Preparing,
            assigned_at,
            delivered_at: None,
        }
    }

    /// Rehydrate from persisted columns; the delivery stamp must agree with the status.
    pub fn from_parts(
        id: ShipmentId,
        order_id: OrderId,
        carrier_id: UserId,
        status: ShipmentStatus,
        assigned_at: DateTime<Utc>,
        delivered_at: Option<DateTime<Utc>>,
    ) -> DomainResult<Self> {
        if (status == ShipmentStatus::Delivered) != delivered_at.is_some() {
            return Err(DomainError::invariant(format!(
                "shipment {id} has status {status} but delivered_at = {delivered_at:?}"
            )));
        }
        Ok(Self {
            id,
            order_id,
            carrier_id,
            status,
            assigned_at,
            delivered_at,
        })
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn carrier_id(&self) -> UserId {
        self.carrier_id
    }

    pub fn status(&self) -> ShipmentStatus {
        self.status
    }

    pub fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn is_delivered(&self) -> bool {
        self.status == ShipmentStatus::Delivered
    }

    /// Advance the sub-status; `Delivered` stamps `at` as the delivery time.
    pub fn advance(&mut self, target: ShipmentStatus, at: DateTime<Utc>) -> DomainResult<ShipmentStatus> {
        if !self.status.can_transition_to(target) {
            return Err(DomainError::invalid_transition(
                "shipment",
                self.status.as_str(),
                target.as_str(),
            ));
        }
        let from = self.status;
        self.status = target;
        if target == ShipmentStatus::Delivered {
            self.delivered_at = Some(at);
        }
        Ok(from)
    }
}

impl Entity for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    fn fresh() -> Shipment {
        Shipment::assign(ShipmentId::new(1), OrderId::new(42), UserId::new(9), at(100))
    }

    #[test]
    fn starts_preparing_without_delivery_stamp() {
        let s = fresh();
        assert_eq!(s.status(), ShipmentStatus::Preparing);
        assert_eq!(s.delivered_at(), None);
    }

    #[test]
    fn delivery_stamps_timestamp() {
        let mut s = fresh();
        s.advance(ShipmentStatus::EnRoute, at(200)).unwrap();
        assert_eq!(s.delivered_at(), None);
        s.advance(ShipmentStatus::Delivered, at(300)).unwrap();
        assert_eq!(s.delivered_at(), Some(at(300)));
    }

    #[test]
    fn cannot_skip_en_route() {
        let mut s = fresh();
        let err = s.advance(ShipmentStatus::Delivered, at(300)).unwrap_err();
        assert_eq!(
            err,
            DomainError::invalid_transition("shipment", "preparing", "delivered")
        );
        assert_eq!(s.status(), ShipmentStatus::Preparing);
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("en-route".parse::<ShipmentStatus>().unwrap(), ShipmentStatus::EnRoute);
        assert_eq!("Delivered".parse::<ShipmentStatus>().unwrap(), ShipmentStatus::Delivered);
        assert!("lost".parse::<ShipmentStatus>().is_err());
    }

    #[test]
    fn rehydration_checks_delivery_stamp() {
        let bad = Shipment::from_parts(
            ShipmentId::new(1),
            OrderId::new(1),
            UserId::new(9),
            ShipmentStatus::EnRoute,
            at(1),
            Some(at(2)),
        );
        assert!(bad.is_err());
    }

    proptest! {
        /// Property: whatever is requested, delivered_at is set iff status is Delivered.
        #[test]
        fn delivery_stamp_tracks_status(targets in prop::collection::vec(0usize..3, 0..10)) {
            let mut s = fresh();
            for (i, t) in targets.into_iter().enumerate() {
                let _ = s.advance(ShipmentStatus::ALL[t], at(1_000 + i as i64));
                prop_assert_eq!(s.is_delivered(), s.delivered_at().is_some());
            }
        }
    }
}
