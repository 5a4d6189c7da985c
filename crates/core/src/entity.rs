//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Every persisted record in rentdesk is an entity: it keeps its identifier
/// for life, while the rest of its state changes through guarded methods.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Soft-delete flag. Inactive entities are hidden from default listings.
    fn is_active(&self) -> bool;
}
