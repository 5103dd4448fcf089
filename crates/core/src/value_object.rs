//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity** and are **immutable**: to "modify" one,
/// build a new one. [`crate::Money`] and the order line snapshot are value
/// objects; orders and products are entities.
///
/// ```ignore
/// let a = Money::from_minor_units(2500);
/// let b = Money::from_minor_units(2500);
/// assert_eq!(a, b); // equal by value
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
