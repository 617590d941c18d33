//! File-metadata rules for product images.
//!
//! Shared by `add_image` and the individual `change_*` operations so both
//! paths reject exactly the same inputs.

use catalog_core::{DomainResult, rules};

pub const MAX_IMAGES_PER_VARIANT: usize = 50;

pub const MIN_FILE_SIZE_BYTES: i64 = 1;
pub const MAX_FILE_SIZE_BYTES: i64 = 50 * 1024 * 1024;

pub const MIN_DIMENSION_PX: i32 = 50;
pub const MAX_DIMENSION_PX: i32 = 5000;

pub const MIN_SORT_ORDER: i32 = 1;
pub const MAX_SORT_ORDER: i32 = 50;

pub const MAX_STORAGE_PATH_LEN: usize = 500;
pub const MAX_FILE_NAME_LEN: usize = 255;

pub fn file_size(bytes: i64) -> DomainResult<()> {
    rules::in_range("file_size_bytes", bytes, MIN_FILE_SIZE_BYTES, MAX_FILE_SIZE_BYTES)
}

pub fn dimension(width: i32, height: i32) -> DomainResult<()> {
    rules::in_range("width", width, MIN_DIMENSION_PX, MAX_DIMENSION_PX)?;
    rules::in_range("height", height, MIN_DIMENSION_PX, MAX_DIMENSION_PX)
}

pub fn sort_order(order: i32) -> DomainResult<()> {
    rules::in_range("sort_order", order, MIN_SORT_ORDER, MAX_SORT_ORDER)
}

/// Returns the trimmed path.
pub fn storage_path(path: &str) -> DomainResult<String> {
    rules::text("storage_path", path, 1, MAX_STORAGE_PATH_LEN)
}

/// Returns the trimmed file name.
pub fn file_name(name: &str) -> DomainResult<String> {
    rules::text("original_file_name", name, 1, MAX_FILE_NAME_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_size_bounds() {
        assert!(file_size(0).is_err());
        assert!(file_size(1).is_ok());
        assert!(file_size(MAX_FILE_SIZE_BYTES).is_ok());
        assert!(file_size(MAX_FILE_SIZE_BYTES + 1).is_err());
    }

    #[test]
    fn dimension_bounds_apply_to_both_axes() {
        assert!(dimension(50, 5000).is_ok());
        assert!(dimension(49, 100).is_err());
        assert!(dimension(100, 5001).is_err());
    }

    #[test]
    fn sort_order_bounds() {
        assert!(sort_order(0).is_err());
        assert!(sort_order(1).is_ok());
        assert!(sort_order(50).is_ok());
        assert!(sort_order(51).is_err());
    }

    #[test]
    fn storage_path_is_trimmed_and_bounded() {
        assert_eq!(storage_path(" media/a.jpg ").unwrap(), "media/a.jpg");
        assert!(storage_path("").is_err());
        assert!(storage_path(&"x".repeat(MAX_STORAGE_PATH_LEN + 1)).is_err());
    }
}
