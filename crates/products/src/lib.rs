//! Products domain module (event-sourced).
//!
//! This crate contains business rules for catalog products, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;
pub mod rating;

pub use product::{
    MAX_VARIANTS_PER_PRODUCT, Product, ProductCreated, ProductEvent, ProductId,
    ProductLifecycleMarked, ProductRated, ProductStatus, ProductStatusChanged,
    VariantReferenceChanged,
};
pub use rating::Rating;
