//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Implemented by plain (non-event-sourced) entities such as categories and by
/// child records owned by an aggregate, such as product images.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Soft-deleted entities are kept for history but refuse mutation.
    fn is_deleted(&self) -> bool {
        false
    }
}
