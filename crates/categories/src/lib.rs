//! Catalog taxonomy: categories and their sub-categories.
//!
//! These are plain entities with soft delete; they are not event-sourced.

pub mod category;

pub use category::{Category, CategoryName, SubCategory};
