use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalog_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, Entity, EventRecorder, ProductVariantId,
};
use catalog_events::Event;

use crate::ids::{ImageId, VariantMediaId};
use crate::media_rules::{self, MAX_IMAGES_PER_VARIANT};

/// One image in a variant's gallery. Owned by [`VariantMedia`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    id: ImageId,
    original_file_name: String,
    storage_path: String,
    file_size_bytes: i64,
    is_main: bool,
    sort_order: i32,
    width: i32,
    height: i32,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Entity for ProductImage {
    type Id = ImageId;

    fn id(&self) -> &ImageId {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }
}

impl ProductImage {
    pub fn original_file_name(&self) -> &str {
        &self.original_file_name
    }

    pub fn storage_path(&self) -> &str {
        &self.storage_path
    }

    pub fn file_size_bytes(&self) -> i64 {
        self.file_size_bytes
    }

    pub fn is_main(&self) -> bool {
        self.is_main
    }

    pub fn sort_order(&self) -> i32 {
        self.sort_order
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
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

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }
}

/// Input for [`VariantMedia::add_image`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewImage {
    pub id: ImageId,
    pub original_file_name: String,
    pub storage_path: String,
    pub file_size_bytes: i64,
    pub is_main: bool,
    pub sort_order: i32,
    pub width: i32,
    pub height: i32,
}

/// Aggregate root: VariantMedia.
///
/// Image gallery of one variant. At most one non-deleted image is the main
/// image, and at most [`MAX_IMAGES_PER_VARIANT`] images are live at once.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantMedia {
    id: VariantMediaId,
    variant_id: Option<ProductVariantId>,
    images: Vec<ProductImage>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    created: bool,
    recorder: EventRecorder<MediaEvent>,
}

/// Event: MediaCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCreated {
    pub media_id: VariantMediaId,
    pub variant_id: ProductVariantId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ImageAdded. Already-validated, trimmed image data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAdded {
    pub media_id: VariantMediaId,
    pub image: NewImage,
    pub occurred_at: DateTime<Utc>,
}

/// Event payload for changes that only name an image (main flag, delete, restore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMarked {
    pub media_id: VariantMediaId,
    pub image_id: ImageId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSortOrderChanged {
    pub media_id: VariantMediaId,
    pub image_id: ImageId,
    pub sort_order: i32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStoragePathChanged {
    pub media_id: VariantMediaId,
    pub image_id: ImageId,
    pub storage_path: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensionChanged {
    pub media_id: VariantMediaId,
    pub image_id: ImageId,
    pub width: i32,
    pub height: i32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFileSizeChanged {
    pub media_id: VariantMediaId,
    pub image_id: ImageId,
    pub file_size_bytes: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MediaEvent {
    MediaCreated(MediaCreated),
    ImageAdded(ImageAdded),
    ImageDemoted(ImageMarked),
    ImagePromoted(ImageMarked),
    ImageSortOrderChanged(ImageSortOrderChanged),
    ImageStoragePathChanged(ImageStoragePathChanged),
    ImageDimensionChanged(ImageDimensionChanged),
    ImageFileSizeChanged(ImageFileSizeChanged),
    ImageDeleted(ImageMarked),
    ImageRestored(ImageMarked),
}

impl Event for MediaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MediaEvent::MediaCreated(_) => "catalog.media.created",
            MediaEvent::ImageAdded(_) => "catalog.media.image_added",
            MediaEvent::ImageDemoted(_) => "catalog.media.image_demoted",
            MediaEvent::ImagePromoted(_) => "catalog.media.image_promoted",
            MediaEvent::ImageSortOrderChanged(_) => "catalog.media.image_sort_order_changed",
            MediaEvent::ImageStoragePathChanged(_) => "catalog.media.image_storage_path_changed",
            MediaEvent::ImageDimensionChanged(_) => "catalog.media.image_dimension_changed",
            MediaEvent::ImageFileSizeChanged(_) => "catalog.media.image_file_size_changed",
            MediaEvent::ImageDeleted(_) => "catalog.media.image_deleted",
            MediaEvent::ImageRestored(_) => "catalog.media.image_restored",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MediaEvent::MediaCreated(e) => e.occurred_at,
            MediaEvent::ImageAdded(e) => e.occurred_at,
            MediaEvent::ImageDemoted(e)
            | MediaEvent::ImagePromoted(e)
            | MediaEvent::ImageDeleted(e)
            | MediaEvent::ImageRestored(e) => e.occurred_at,
            MediaEvent::ImageSortOrderChanged(e) => e.occurred_at,
            MediaEvent::ImageStoragePathChanged(e) => e.occurred_at,
            MediaEvent::ImageDimensionChanged(e) => e.occurred_at,
            MediaEvent::ImageFileSizeChanged(e) => e.occurred_at,
        }
    }
}

impl MediaEvent {
    /// Existing image this event modifies. `None` for creation and additions.
    fn target_image(&self) -> Option<ImageId> {
        match self {
            MediaEvent::MediaCreated(_) | MediaEvent::ImageAdded(_) => None,
            MediaEvent::ImageDemoted(e)
            | MediaEvent::ImagePromoted(e)
            | MediaEvent::ImageDeleted(e)
            | MediaEvent::ImageRestored(e) => Some(e.image_id),
            MediaEvent::ImageSortOrderChanged(e) => Some(e.image_id),
            MediaEvent::ImageStoragePathChanged(e) => Some(e.image_id),
            MediaEvent::ImageDimensionChanged(e) => Some(e.image_id),
            MediaEvent::ImageFileSizeChanged(e) => Some(e.image_id),
        }
    }
}

impl AggregateRoot for VariantMedia {
    type Id = VariantMediaId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.recorder.version()
    }
}

impl Aggregate for VariantMedia {
    type Event = MediaEvent;
    const AGGREGATE_TYPE: &'static str = "catalog.variant_media";

    fn empty(id: VariantMediaId) -> Self {
        Self {
            id,
            variant_id: None,
            images: Vec::new(),
            created_at: DateTime::<Utc>::default(),
            updated_at: None,
            created: false,
            recorder: EventRecorder::new(),
        }
    }

    fn apply(&mut self, event: &MediaEvent) {
        match event {
            MediaEvent::MediaCreated(e) => {
                self.id = e.media_id;
                self.variant_id = Some(e.variant_id);
                self.images.clear();
                self.created_at = e.occurred_at;
                self.created = true;
                return;
            }
            MediaEvent::ImageAdded(e) => {
                let new = &e.image;
                self.images.push(ProductImage {
                    id: new.id,
                    original_file_name: new.original_file_name.clone(),
                    storage_path: new.storage_path.clone(),
                    file_size_bytes: new.file_size_bytes,
                    is_main: new.is_main,
                    sort_order: new.sort_order,
                    width: new.width,
                    height: new.height,
                    is_deleted: false,
                    created_at: e.occurred_at,
                    updated_at: None,
                    deleted_at: None,
                });
            }
            // Business methods and check_replay both resolve the image first.
            MediaEvent::ImageDemoted(e) => {
                if let Some(image) = self.image_mut(e.image_id) {
                    image.is_main = false;
                    image.touch(e.occurred_at);
                }
            }
            MediaEvent::ImagePromoted(e) => {
                if let Some(image) = self.image_mut(e.image_id) {
                    image.is_main = true;
                    image.touch(e.occurred_at);
                }
            }
            MediaEvent::ImageSortOrderChanged(e) => {
                if let Some(image) = self.image_mut(e.image_id) {
                    image.sort_order = e.sort_order;
                    image.touch(e.occurred_at);
                }
            }
            MediaEvent::ImageStoragePathChanged(e) => {
                if let Some(image) = self.image_mut(e.image_id) {
                    image.storage_path = e.storage_path.clone();
                    image.touch(e.occurred_at);
                }
            }
            MediaEvent::ImageDimensionChanged(e) => {
                if let Some(image) = self.image_mut(e.image_id) {
                    image.width = e.width;
                    image.height = e.height;
                    image.touch(e.occurred_at);
                }
            }
            MediaEvent::ImageFileSizeChanged(e) => {
                if let Some(image) = self.image_mut(e.image_id) {
                    image.file_size_bytes = e.file_size_bytes;
                    image.touch(e.occurred_at);
                }
            }
            MediaEvent::ImageDeleted(e) => {
                if let Some(image) = self.image_mut(e.image_id) {
                    image.is_deleted = true;
                    image.is_main = false;
                    image.deleted_at = Some(e.occurred_at);
                    image.touch(e.occurred_at);
                }
            }
            MediaEvent::ImageRestored(e) => {
                if let Some(image) = self.image_mut(e.image_id) {
                    image.is_deleted = false;
                    image.deleted_at = None;
                    image.touch(e.occurred_at);
                }
            }
        }
        self.updated_at = Some(event.occurred_at());
    }

    fn check_replay(&self, event: &MediaEvent) -> DomainResult<()> {
        let problem = match event {
            MediaEvent::ImageAdded(e) if self.image(e.image.id).is_some() => {
                Some(format!("repeats image {}", e.image.id))
            }
            _ => event
                .target_image()
                .filter(|id| self.image(*id).is_none())
                .map(|id| format!("names unknown image {id}")),
        };
        match problem {
            Some(problem) => Err(DomainError::replay(format!(
                "media {}: {} {problem}",
                self.id,
                event.event_type()
            ))),
            None => Ok(()),
        }
    }

    fn recorder(&self) -> &EventRecorder<MediaEvent> {
        &self.recorder
    }

    fn recorder_mut(&mut self) -> &mut EventRecorder<MediaEvent> {
        &mut self.recorder
    }
}

impl VariantMedia {
    pub fn create(id: VariantMediaId, variant_id: ProductVariantId, now: DateTime<Utc>) -> Self {
        let mut media = Self::empty(id);
        media.raise(MediaEvent::MediaCreated(MediaCreated {
            media_id: id,
            variant_id,
            occurred_at: now,
        }));
        media
    }

    pub fn id_typed(&self) -> VariantMediaId {
        self.id
    }

    pub fn variant_id(&self) -> Option<ProductVariantId> {
        self.variant_id
    }

    /// All images, including soft-deleted ones, in insertion order.
    pub fn images(&self) -> &[ProductImage] {
        &self.images
    }

    pub fn active_images(&self) -> impl Iterator<Item = &ProductImage> {
        self.images.iter().filter(|i| !i.is_deleted)
    }

    pub fn image(&self, image_id: ImageId) -> Option<&ProductImage> {
        self.images.iter().find(|i| i.id == image_id)
    }

    pub fn main_image(&self) -> Option<&ProductImage> {
        self.active_images().find(|i| i.is_main)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Add an image. When `is_main` is set and another image currently holds
    /// main status, that image is demoted first (two events, in that order).
    pub fn add_image(&mut self, image: NewImage, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_created()?;
        let original_file_name =
            self.in_context(media_rules::file_name(&image.original_file_name))?;
        let storage_path = self.in_context(media_rules::storage_path(&image.storage_path))?;
        self.in_context(media_rules::file_size(image.file_size_bytes))?;
        self.in_context(media_rules::dimension(image.width, image.height))?;
        self.in_context(media_rules::sort_order(image.sort_order))?;

        if self.image(image.id).is_some() {
            return Err(DomainError::invariant(format!(
                "media {}: image {} already exists",
                self.id, image.id
            )));
        }
        self.ensure_capacity()?;

        let demoted = if image.is_main {
            self.main_image().map(|m| m.id)
        } else {
            None
        };

        if let Some(previous) = demoted {
            self.raise(MediaEvent::ImageDemoted(self.marked(previous, now)));
        }
        self.raise(MediaEvent::ImageAdded(ImageAdded {
            media_id: self.id,
            image: NewImage {
                original_file_name,
                storage_path,
                ..image
            },
            occurred_at: now,
        }));
        Ok(())
    }

    /// Make `image_id` the main image. No-op if it already is.
    pub fn mark_image_as_main(
        &mut self,
        image_id: ImageId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_created()?;
        let target = self.live_image(image_id)?;
        if target.is_main {
            return Ok(());
        }

        if let Some(previous) = self.main_image().map(|m| m.id) {
            self.raise(MediaEvent::ImageDemoted(self.marked(previous, now)));
        }
        self.raise(MediaEvent::ImagePromoted(self.marked(image_id, now)));
        Ok(())
    }

    pub fn change_sort_order(
        &mut self,
        image_id: ImageId,
        sort_order: i32,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_created()?;
        self.in_context(media_rules::sort_order(sort_order))?;
        if self.live_image(image_id)?.sort_order == sort_order {
            return Ok(());
        }

        self.raise(MediaEvent::ImageSortOrderChanged(ImageSortOrderChanged {
            media_id: self.id,
            image_id,
            sort_order,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn change_storage_path(
        &mut self,
        image_id: ImageId,
        storage_path: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_created()?;
        let storage_path = self.in_context(media_rules::storage_path(storage_path))?;
        if self.live_image(image_id)?.storage_path == storage_path {
            return Ok(());
        }

        self.raise(MediaEvent::ImageStoragePathChanged(ImageStoragePathChanged {
            media_id: self.id,
            image_id,
            storage_path,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn change_dimension(
        &mut self,
        image_id: ImageId,
        width: i32,
        height: i32,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_created()?;
        self.in_context(media_rules::dimension(width, height))?;
        let image = self.live_image(image_id)?;
        if image.width == width && image.height == height {
            return Ok(());
        }

        self.raise(MediaEvent::ImageDimensionChanged(ImageDimensionChanged {
            media_id: self.id,
            image_id,
            width,
            height,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn change_file_size_bytes(
        &mut self,
        image_id: ImageId,
        file_size_bytes: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_created()?;
        self.in_context(media_rules::file_size(file_size_bytes))?;
        if self.live_image(image_id)?.file_size_bytes == file_size_bytes {
            return Ok(());
        }

        self.raise(MediaEvent::ImageFileSizeChanged(ImageFileSizeChanged {
            media_id: self.id,
            image_id,
            file_size_bytes,
            occurred_at: now,
        }));
        Ok(())
    }

    /// Soft-delete an image. A deleted image loses its main flag.
    pub fn delete_image(&mut self, image_id: ImageId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_created()?;
        self.live_image(image_id)?;

        self.raise(MediaEvent::ImageDeleted(self.marked(image_id, now)));
        Ok(())
    }

    pub fn restore_image(&mut self, image_id: ImageId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_created()?;
        let image = self
            .image(image_id)
            .ok_or_else(|| DomainError::not_found("image", image_id))?;
        if !image.is_deleted {
            return Err(DomainError::invariant(format!(
                "media {}: image {image_id} is not deleted",
                self.id
            )));
        }
        self.ensure_capacity()?;

        self.raise(MediaEvent::ImageRestored(self.marked(image_id, now)));
        Ok(())
    }

    fn marked(&self, image_id: ImageId, now: DateTime<Utc>) -> ImageMarked {
        ImageMarked {
            media_id: self.id,
            image_id,
            occurred_at: now,
        }
    }

    fn image_mut(&mut self, image_id: ImageId) -> Option<&mut ProductImage> {
        self.images.iter_mut().find(|i| i.id == image_id)
    }

    /// Resolve an image that exists and is not soft-deleted.
    fn in_context<T>(&self, result: DomainResult<T>) -> DomainResult<T> {
        result.map_err(|e| e.context(format!("media {}", self.id)))
    }

    fn live_image(&self, image_id: ImageId) -> DomainResult<&ProductImage> {
        let image = self
            .image(image_id)
            .ok_or_else(|| DomainError::not_found("image", image_id))?;
        if image.is_deleted {
            return Err(DomainError::invariant(format!(
                "media {}: image {image_id} is deleted",
                self.id
            )));
        }
        Ok(image)
    }

    fn ensure_capacity(&self) -> DomainResult<()> {
        if self.active_images().count() >= MAX_IMAGES_PER_VARIANT {
            return Err(DomainError::invariant(format!(
                "media {}: cannot hold more than {MAX_IMAGES_PER_VARIANT} images",
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found("variant media", self.id));
        }
        Ok(())
    }
}
