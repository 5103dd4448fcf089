//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Products, orders and shipments are entities: two records with the same id
/// are the same thing even when their mutable fields (stock, status) differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
