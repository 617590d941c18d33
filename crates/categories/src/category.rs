use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalog_core::{CategoryId, DomainError, DomainResult, Entity, SubCategoryId, rules};

pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Localised display name with its upper-cased shadow forms.
///
/// The normalized values back case-insensitive uniqueness checks at the
/// persistence boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryName {
    name: String,
    name_ru: String,
    normalized_name: String,
    normalized_name_ru: String,
}

impl CategoryName {
    pub fn new(name: &str, name_ru: &str) -> DomainResult<Self> {
        let name = rules::text("name", name, MIN_NAME_LEN, MAX_NAME_LEN)?;
        let name_ru = rules::text("name_ru", name_ru, MIN_NAME_LEN, MAX_NAME_LEN)?;
        Ok(Self {
            normalized_name: rules::normalize(&name),
            normalized_name_ru: rules::normalize(&name_ru),
            name,
            name_ru,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_ru(&self) -> &str {
        &self.name_ru
    }

    pub fn normalized_name(&self) -> &str {
        &self.normalized_name
    }

    pub fn normalized_name_ru(&self) -> &str {
        &self.normalized_name_ru
    }

    /// Whether both names collide case-insensitively with `other`.
    pub fn same_as(&self, other: &CategoryName) -> bool {
        self.normalized_name == other.normalized_name
            && self.normalized_name_ru == other.normalized_name_ru
    }
}

fn checked_description(value: Option<&str>) -> DomainResult<Option<String>> {
    rules::optional_text("description", value, 1, MAX_DESCRIPTION_LEN)
}

/// Soft-delete bookkeeping shared by categories and sub-categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Lifecycle {
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            is_deleted: false,
            created_at: now,
            updated_at: None,
            deleted_at: None,
        }
    }

    fn ensure_active(&self, what: &str) -> DomainResult<()> {
        if self.is_deleted {
            return Err(DomainError::invariant(format!("{what} is deleted")));
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }

    fn delete(&mut self, what: &str, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active(what)?;
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.touch(now);
        Ok(())
    }

    fn restore(&mut self, what: &str, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_deleted {
            return Err(DomainError::invariant(format!("{what} is not deleted")));
        }
        self.is_deleted = false;
        self.deleted_at = None;
        self.touch(now);
        Ok(())
    }
}

/// Top-level catalog category. Plain entity, not event-sourced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    name: CategoryName,
    description: Option<String>,
    sub_category_ids: Vec<SubCategoryId>,
    lifecycle: Lifecycle,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &CategoryId {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.lifecycle.is_deleted
    }
}

impl Category {
    pub fn new(
        id: CategoryId,
        name: &str,
        name_ru: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: CategoryName::new(name, name_ru)?,
            description: checked_description(description)?,
            sub_category_ids: Vec::new(),
            lifecycle: Lifecycle::new(now),
        })
    }

    pub fn name(&self) -> &CategoryName {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn sub_category_ids(&self) -> &[SubCategoryId] {
        &self.sub_category_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.lifecycle.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.deleted_at
    }

    pub fn rename(&mut self, name: &str, name_ru: &str, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        let name = CategoryName::new(name, name_ru).map_err(|e| e.context(self.label()))?;
        if name != self.name {
            self.name = name;
            self.lifecycle.touch(now);
        }
        Ok(())
    }

    pub fn change_description(
        &mut self,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_active()?;
        let description =
            checked_description(description).map_err(|e| e.context(self.label()))?;
        if description != self.description {
            self.description = description;
            self.lifecycle.touch(now);
        }
        Ok(())
    }

    /// Record that `sub` now belongs to this category.
    pub fn attach_sub_category(
        &mut self,
        sub: &SubCategory,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_active()?;
        if sub.category_id() != self.id {
            return Err(DomainError::invariant(format!(
                "sub-category {} belongs to category {}, not {}",
                sub.id(),
                sub.category_id(),
                self.id
            )));
        }
        if self.sub_category_ids.contains(sub.id()) {
            return Err(DomainError::invariant(format!(
                "category {} already contains sub-category {}",
                self.id,
                sub.id()
            )));
        }
        self.sub_category_ids.push(*sub.id());
        self.lifecycle.touch(now);
        Ok(())
    }

    pub fn detach_sub_category(
        &mut self,
        sub_category_id: SubCategoryId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_active()?;
        let Some(pos) = self.sub_category_ids.iter().position(|id| *id == sub_category_id) else {
            return Err(DomainError::not_found("sub-category", sub_category_id));
        };
        self.sub_category_ids.remove(pos);
        self.lifecycle.touch(now);
        Ok(())
    }

    pub fn delete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.lifecycle.delete(&self.label(), now)
    }

    pub fn restore(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.lifecycle.restore(&self.label(), now)
    }

    fn label(&self) -> String {
        format!("category {}", self.id)
    }

    fn ensure_active(&self) -> DomainResult<()> {
        self.lifecycle.ensure_active(&self.label())
    }
}

/// Second-level category; products are filed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCategory {
    id: SubCategoryId,
    category_id: CategoryId,
    name: CategoryName,
    description: Option<String>,
    lifecycle: Lifecycle,
}

impl Entity for SubCategory {
    type Id = SubCategoryId;

    fn id(&self) -> &SubCategoryId {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.lifecycle.is_deleted
    }
}

impl SubCategory {
    pub fn new(
        id: SubCategoryId,
        category_id: CategoryId,
        name: &str,
        name_ru: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            category_id,
            name: CategoryName::new(name, name_ru)?,
            description: checked_description(description)?,
            lifecycle: Lifecycle::new(now),
        })
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn name(&self) -> &CategoryName {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.updated_at
    }

    pub fn rename(&mut self, name: &str, name_ru: &str, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        let name = CategoryName::new(name, name_ru).map_err(|e| e.context(self.label()))?;
        if name != self.name {
            self.name = name;
            self.lifecycle.touch(now);
        }
        Ok(())
    }

    pub fn change_description(
        &mut self,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_active()?;
        let description =
            checked_description(description).map_err(|e| e.context(self.label()))?;
        if description != self.description {
            self.description = description;
            self.lifecycle.touch(now);
        }
        Ok(())
    }

    pub fn delete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.lifecycle.delete(&self.label(), now)
    }

    pub fn restore(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.lifecycle.restore(&self.label(), now)
    }

    fn label(&self) -> String {
        format!("sub-category {}", self.id)
    }

    fn ensure_active(&self) -> DomainResult<()> {
        self.lifecycle.ensure_active(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn category_id(n: i64) -> CategoryId {
        CategoryId::try_new(n).unwrap()
    }

    fn shoes() -> Category {
        Category::new(category_id(1), "Shoes", "Обувь", Some("All footwear"), t(0)).unwrap()
    }

    #[test]
    fn new_stores_normalized_shadow_names() {
        let category = shoes();
        assert_eq!(category.name().name(), "Shoes");
        assert_eq!(category.name().normalized_name(), "SHOES");
        assert_eq!(category.name().normalized_name_ru(), "ОБУВЬ");
        assert_eq!(category.description(), Some("All footwear"));
        assert!(!category.is_deleted());
    }

    #[test]
    fn name_and_description_bounds() {
        let id = category_id(1);
        assert!(Category::new(id, "S", "Обувь", None, t(0)).is_err());
        assert!(Category::new(id, &"s".repeat(101), "Обувь", None, t(0)).is_err());
        assert!(Category::new(id, "Shoes", "О", None, t(0)).is_err());
        assert!(Category::new(id, "Shoes", "Обувь", Some(""), t(0)).is_err());
        assert!(Category::new(id, "Shoes", "Обувь", Some("d".repeat(501).as_str()), t(0)).is_err());
        assert!(Category::new(id, "Shoes", "Обувь", Some("d".repeat(500).as_str()), t(0)).is_ok());
        assert!(Category::new(id, "Sh", "Об", None, t(0)).is_ok());
    }

    #[test]
    fn names_compare_case_insensitively() {
        let a = CategoryName::new("Shoes", "Обувь").unwrap();
        let b = CategoryName::new("SHOES ", "обувь").unwrap();
        assert!(a.same_as(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn rename_touches_only_on_change() {
        let mut category = shoes();
        category.rename("Shoes", "Обувь", t(1)).unwrap();
        assert_eq!(category.updated_at(), None);

        category.rename("Footwear", "Обувь", t(2)).unwrap();
        assert_eq!(category.name().normalized_name(), "FOOTWEAR");
        assert_eq!(category.updated_at(), Some(t(2)));

        category.change_description(None, t(3)).unwrap();
        assert_eq!(category.description(), None);

        let err = category.rename("S", "Обувь", t(4)).unwrap_err();
        assert!(err.to_string().contains(&format!("category {}:", category.id())), "{err}");
        assert_eq!(category.updated_at(), Some(t(2)));
    }

    #[test]
    fn deleted_category_refuses_changes_until_restored() {
        let mut category = shoes();
        category.delete(t(1)).unwrap();
        assert!(category.is_deleted());
        assert_eq!(category.deleted_at(), Some(t(1)));

        assert!(category.rename("Boots", "Сапоги", t(2)).is_err());
        assert!(category.delete(t(2)).is_err());

        category.restore(t(3)).unwrap();
        assert!(!category.is_deleted());
        assert!(category.restore(t(4)).is_err());
        category.rename("Boots", "Сапоги", t(5)).unwrap();
    }

    #[test]
    fn sub_categories_are_foreign_keyed() {
        let mut category = shoes();
        let sneakers = SubCategory::new(
            SubCategoryId::try_new(10).unwrap(),
            category_id(1),
            "Sneakers",
            "Кроссовки",
            None,
            t(1),
        )
        .unwrap();
        let foreign = SubCategory::new(
            SubCategoryId::try_new(11).unwrap(),
            category_id(2),
            "Dresses",
            "Платья",
            None,
            t(1),
        )
        .unwrap();

        category.attach_sub_category(&sneakers, t(2)).unwrap();
        assert_eq!(category.sub_category_ids(), &[*sneakers.id()]);
        assert!(category.attach_sub_category(&sneakers, t(3)).is_err());
        assert!(category.attach_sub_category(&foreign, t(3)).is_err());

        category.detach_sub_category(*sneakers.id(), t(4)).unwrap();
        assert!(category.sub_category_ids().is_empty());
        assert!(matches!(
            category.detach_sub_category(*sneakers.id(), t(5)).unwrap_err(),
            DomainError::NotFound { .. }
        ));
    }

    #[test]
    fn sub_category_soft_delete() {
        let mut sub = SubCategory::new(
            SubCategoryId::try_new(3).unwrap(),
            category_id(1),
            "Boots",
            "Сапоги",
            Some("Winter boots"),
            t(0),
        )
        .unwrap();
        sub.change_description(Some("All boots"), t(1)).unwrap();
        assert_eq!(sub.description(), Some("All boots"));

        sub.delete(t(2)).unwrap();
        assert!(sub.change_description(None, t(3)).is_err());
        sub.restore(t(4)).unwrap();
        sub.rename("Ankle boots", "Ботильоны", t(5)).unwrap();
        assert_eq!(sub.name().normalized_name(), "ANKLE BOOTS");
    }
}
