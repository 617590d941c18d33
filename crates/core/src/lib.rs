//! `catalog-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the event-sourced aggregate engine, identifiers, the domain error model and
//! the shared rule validators.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod rules;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, EventRecorder, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    AggregateId, CategoryId, IdGenerator, ProductVariantId, SellerId, SequentialIdGenerator,
    SubCategoryId, UuidV7Generator,
};
pub use value_object::ValueObject;
