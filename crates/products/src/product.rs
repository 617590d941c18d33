use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use catalog_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, EventRecorder,
    ProductVariantId, SellerId, SubCategoryId,
};
use catalog_events::Event;

use crate::rating::Rating;

/// Maximum number of variants a single product may reference.
pub const MAX_VARIANTS_PER_PRODUCT: usize = 50;

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for ProductId {
    fn from(value: Uuid) -> Self {
        Self(AggregateId::from_uuid(value))
    }
}

impl From<ProductId> for AggregateId {
    fn from(value: ProductId) -> Self {
        value.0
    }
}

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    PendingModeration,
    Rejected,
    Approved,
    Draft,
    Published,
    Hidden,
    Archived,
    Deleted,
}

/// Aggregate root: Product.
///
/// Owns the ordered list of variant references and the aggregated rating. It
/// does not own variant internals (stock, media, attributes live in their own
/// aggregates).
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    id: ProductId,
    seller_id: Option<SellerId>,
    sub_category_id: Option<SubCategoryId>,
    status: ProductStatus,
    overall_rating: Rating,
    variant_ids: Vec<ProductVariantId>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    created: bool,
    recorder: EventRecorder<ProductEvent>,
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub seller_id: SellerId,
    pub sub_category_id: SubCategoryId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a variant was attached to (or detached from) the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantReferenceChanged {
    pub product_id: ProductId,
    pub variant_id: ProductVariantId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: moderation or visibility status set directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStatusChanged {
    pub product_id: ProductId,
    pub status: ProductStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductRated. Carries the resulting rating so replay never recomputes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRated {
    pub product_id: ProductId,
    pub score: i64,
    pub rating: Rating,
    pub occurred_at: DateTime<Utc>,
}

/// Event without payload beyond identity and time (publish, delete, restore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLifecycleMarked {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    VariantReferenceAdded(VariantReferenceChanged),
    VariantReferenceRemoved(VariantReferenceChanged),
    ProductPublished(ProductLifecycleMarked),
    ProductStatusChanged(ProductStatusChanged),
    ProductRated(ProductRated),
    ProductDeleted(ProductLifecycleMarked),
    ProductRestored(ProductLifecycleMarked),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::VariantReferenceAdded(_) => "catalog.product.variant_added",
            ProductEvent::VariantReferenceRemoved(_) => "catalog.product.variant_removed",
            ProductEvent::ProductPublished(_) => "catalog.product.published",
            ProductEvent::ProductStatusChanged(_) => "catalog.product.status_changed",
            ProductEvent::ProductRated(_) => "catalog.product.rated",
            ProductEvent::ProductDeleted(_) => "catalog.product.deleted",
            ProductEvent::ProductRestored(_) => "catalog.product.restored",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::VariantReferenceAdded(e) => e.occurred_at,
            ProductEvent::VariantReferenceRemoved(e) => e.occurred_at,
            ProductEvent::ProductPublished(e) => e.occurred_at,
            ProductEvent::ProductStatusChanged(e) => e.occurred_at,
            ProductEvent::ProductRated(e) => e.occurred_at,
            ProductEvent::ProductDeleted(e) => e.occurred_at,
            ProductEvent::ProductRestored(e) => e.occurred_at,
        }
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.recorder.version()
    }
}

impl Aggregate for Product {
    type Event = ProductEvent;
    const AGGREGATE_TYPE: &'static str = "catalog.product";

    fn empty(id: ProductId) -> Self {
        Self {
            id,
            seller_id: None,
            sub_category_id: None,
            status: ProductStatus::PendingModeration,
            overall_rating: Rating::empty(),
            variant_ids: Vec::new(),
            created_at: DateTime::<Utc>::default(),
            updated_at: None,
            deleted_at: None,
            created: false,
            recorder: EventRecorder::new(),
        }
    }

    fn apply(&mut self, event: &ProductEvent) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.seller_id = Some(e.seller_id);
                self.sub_category_id = Some(e.sub_category_id);
                self.status = ProductStatus::PendingModeration;
                self.overall_rating = Rating::empty();
                self.variant_ids.clear();
                self.created_at = e.occurred_at;
                self.created = true;
            }
            ProductEvent::VariantReferenceAdded(e) => {
                self.variant_ids.push(e.variant_id);
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::VariantReferenceRemoved(e) => {
                self.variant_ids.retain(|id| *id != e.variant_id);
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::ProductPublished(e) => {
                self.status = ProductStatus::Published;
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::ProductStatusChanged(e) => {
                self.status = e.status;
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::ProductRated(e) => {
                self.overall_rating = e.rating;
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::ProductDeleted(e) => {
                self.status = ProductStatus::Deleted;
                self.deleted_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::ProductRestored(e) => {
                self.status = ProductStatus::Draft;
                self.deleted_at = None;
                self.updated_at = Some(e.occurred_at);
            }
        }
    }

    fn recorder(&self) -> &EventRecorder<ProductEvent> {
        &self.recorder
    }

    fn recorder_mut(&mut self) -> &mut EventRecorder<ProductEvent> {
        &mut self.recorder
    }
}

impl Product {
    /// Create a new product awaiting moderation.
    pub fn create(
        id: ProductId,
        seller_id: SellerId,
        sub_category_id: SubCategoryId,
        now: DateTime<Utc>,
    ) -> Self {
        let mut product = Self::empty(id);
        product.raise(ProductEvent::ProductCreated(ProductCreated {
            product_id: id,
            seller_id,
            sub_category_id,
            occurred_at: now,
        }));
        product
    }

    /// Same as [`Product::create`] but from raw keys, which must be positive.
    pub fn create_from_raw(
        id: ProductId,
        seller_id: i64,
        sub_category_id: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let seller_id = SellerId::try_new(seller_id)?;
        let sub_category_id = SubCategoryId::try_new(sub_category_id)?;
        Ok(Self::create(id, seller_id, sub_category_id, now))
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn seller_id(&self) -> Option<SellerId> {
        self.seller_id
    }

    pub fn sub_category_id(&self) -> Option<SubCategoryId> {
        self.sub_category_id
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn overall_rating(&self) -> &Rating {
        &self.overall_rating
    }

    pub fn variant_ids(&self) -> &[ProductVariantId] {
        &self.variant_ids
    }

    pub fn has_variant(&self, variant_id: ProductVariantId) -> bool {
        self.variant_ids.contains(&variant_id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.status == ProductStatus::Deleted
    }

    /// Check if the product is visible to buyers.
    pub fn is_published(&self) -> bool {
        self.status == ProductStatus::Published
    }

    pub fn add_variant_reference(
        &mut self,
        variant_id: ProductVariantId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_active()?;
        if self.has_variant(variant_id) {
            return Err(DomainError::invariant(format!(
                "product {} already references variant {variant_id}",
                self.id
            )));
        }
        if self.variant_ids.len() >= MAX_VARIANTS_PER_PRODUCT {
            return Err(DomainError::invariant(format!(
                "product {} cannot reference more than {MAX_VARIANTS_PER_PRODUCT} variants",
                self.id
            )));
        }

        self.raise(ProductEvent::VariantReferenceAdded(VariantReferenceChanged {
            product_id: self.id,
            variant_id,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn remove_variant_reference(
        &mut self,
        variant_id: ProductVariantId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_active()?;
        if !self.has_variant(variant_id) {
            return Err(DomainError::not_found("product variant", variant_id));
        }

        self.raise(ProductEvent::VariantReferenceRemoved(VariantReferenceChanged {
            product_id: self.id,
            variant_id,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn publish(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if self.variant_ids.is_empty() {
            return Err(DomainError::invariant(format!(
                "product {} must have variants before it can be published",
                self.id
            )));
        }
        if self.status == ProductStatus::Published {
            return Err(DomainError::invariant(format!(
                "product {} is already published",
                self.id
            )));
        }

        self.raise(ProductEvent::ProductPublished(ProductLifecycleMarked {
            product_id: self.id,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn mark_as_approved(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.change_status(ProductStatus::Approved, now)
    }

    pub fn mark_as_rejected(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.change_status(ProductStatus::Rejected, now)
    }

    pub fn mark_as_draft(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.change_status(ProductStatus::Draft, now)
    }

    pub fn mark_as_archived(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.change_status(ProductStatus::Archived, now)
    }

    pub fn mark_as_hidden(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.change_status(ProductStatus::Hidden, now)
    }

    /// Record one customer score. Score bounds are enforced by [`Rating::add`].
    pub fn rate(&mut self, score: i64, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        let rating = self
            .overall_rating
            .add(score)
            .map_err(|e| e.context(format!("product {}", self.id)))?;

        self.raise(ProductEvent::ProductRated(ProductRated {
            product_id: self.id,
            score,
            rating,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn delete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;

        self.raise(ProductEvent::ProductDeleted(ProductLifecycleMarked {
            product_id: self.id,
            occurred_at: now,
        }));
        Ok(())
    }

    /// Undo a soft delete. The product always comes back as `Draft`.
    pub fn restore(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_created()?;
        if !self.is_deleted() {
            return Err(DomainError::invariant(format!(
                "product {} is not deleted",
                self.id
            )));
        }

        self.raise(ProductEvent::ProductRestored(ProductLifecycleMarked {
            product_id: self.id,
            occurred_at: now,
        }));
        Ok(())
    }

    // Moderation transitions are deliberately unrestricted apart from the
    // deleted guard (e.g. Archived -> Approved is allowed).
    fn change_status(&mut self, status: ProductStatus, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;

        self.raise(ProductEvent::ProductStatusChanged(ProductStatusChanged {
            product_id: self.id,
            status,
            occurred_at: now,
        }));
        Ok(())
    }

    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found("product", self.id));
        }
        Ok(())
    }

    fn ensure_active(&self) -> DomainResult<()> {
        self.ensure_created()?;
        if self.is_deleted() {
            return Err(DomainError::invariant(format!(
                "product {} is deleted",
                self.id
            )));
        }
        Ok(())
    }
}
