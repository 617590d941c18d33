//! Variant-scoped aggregates (event-sourced).
//!
//! Attributes, image galleries and prices of a single product variant, plus
//! size-chart lookups. Pure domain logic (no IO, no HTTP, no storage).

pub mod attribute;
pub mod ids;
pub mod media;
pub mod media_rules;
pub mod pricing;
pub mod size_chart;

pub use attribute::{AttributeEvent, VariantAttribute};
pub use ids::{ImageId, VariantAttributeId, VariantMediaId, VariantPriceId};
pub use media::{MediaEvent, NewImage, ProductImage, VariantMedia};
pub use media_rules::MAX_IMAGES_PER_VARIANT;
pub use pricing::{Currency, PriceChange, PriceEvent, VariantPrice};
pub use size_chart::{ClothingSize, shoe_size_eu_to_us};
