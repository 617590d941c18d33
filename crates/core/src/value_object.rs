//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new instance and replace the old one wholesale (e.g. a product's
/// overall rating is replaced on every new score).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
