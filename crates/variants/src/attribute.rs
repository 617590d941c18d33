use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalog_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, EventRecorder, ProductVariantId, rules,
};
use catalog_events::Event;

use crate::ids::VariantAttributeId;

pub const MIN_KEY_LEN: usize = 2;
pub const MAX_KEY_LEN: usize = 50;
pub const MAX_VALUE_LEN: usize = 200;

/// Aggregate root: VariantAttribute.
///
/// One key/value descriptor of a variant ("MATERIAL" = "leather"). Keys are
/// stored upper-cased so comparisons are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantAttribute {
    id: VariantAttributeId,
    key: String,
    value: String,
    product_variant_id: Option<ProductVariantId>,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    created: bool,
    recorder: EventRecorder<AttributeEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeCreated {
    pub attribute_id: VariantAttributeId,
    pub product_variant_id: ProductVariantId,
    pub key: String,
    pub value: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeKeyChanged {
    pub attribute_id: VariantAttributeId,
    pub key: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValueChanged {
    pub attribute_id: VariantAttributeId,
    pub value: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMarked {
    pub attribute_id: VariantAttributeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AttributeEvent {
    AttributeCreated(AttributeCreated),
    AttributeKeyChanged(AttributeKeyChanged),
    AttributeValueChanged(AttributeValueChanged),
    AttributeDeleted(AttributeMarked),
    AttributeRestored(AttributeMarked),
}

impl Event for AttributeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AttributeEvent::AttributeCreated(_) => "catalog.attribute.created",
            AttributeEvent::AttributeKeyChanged(_) => "catalog.attribute.key_changed",
            AttributeEvent::AttributeValueChanged(_) => "catalog.attribute.value_changed",
            AttributeEvent::AttributeDeleted(_) => "catalog.attribute.deleted",
            AttributeEvent::AttributeRestored(_) => "catalog.attribute.restored",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AttributeEvent::AttributeCreated(e) => e.occurred_at,
            AttributeEvent::AttributeKeyChanged(e) => e.occurred_at,
            AttributeEvent::AttributeValueChanged(e) => e.occurred_at,
            AttributeEvent::AttributeDeleted(e) | AttributeEvent::AttributeRestored(e) => {
                e.occurred_at
            }
        }
    }
}

impl AggregateRoot for VariantAttribute {
    type Id = VariantAttributeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.recorder.version()
    }
}

impl Aggregate for VariantAttribute {
    type Event = AttributeEvent;
    const AGGREGATE_TYPE: &'static str = "catalog.variant_attribute";

    fn empty(id: VariantAttributeId) -> Self {
        Self {
            id,
            key: String::new(),
            value: String::new(),
            product_variant_id: None,
            is_deleted: false,
            created_at: DateTime::<Utc>::default(),
            updated_at: None,
            deleted_at: None,
            created: false,
            recorder: EventRecorder::new(),
        }
    }

    fn apply(&mut self, event: &AttributeEvent) {
        match event {
            AttributeEvent::AttributeCreated(e) => {
                self.id = e.attribute_id;
                self.product_variant_id = Some(e.product_variant_id);
                self.key = e.key.clone();
                self.value = e.value.clone();
                self.is_deleted = false;
                self.created_at = e.occurred_at;
                self.created = true;
            }
            AttributeEvent::AttributeKeyChanged(e) => {
                self.key = e.key.clone();
                self.updated_at = Some(e.occurred_at);
            }
            AttributeEvent::AttributeValueChanged(e) => {
                self.value = e.value.clone();
                self.updated_at = Some(e.occurred_at);
            }
            AttributeEvent::AttributeDeleted(e) => {
                self.is_deleted = true;
                self.deleted_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
            }
            AttributeEvent::AttributeRestored(e) => {
                self.is_deleted = false;
                self.deleted_at = None;
                self.updated_at = Some(e.occurred_at);
            }
        }
    }

    fn recorder(&self) -> &EventRecorder<AttributeEvent> {
        &self.recorder
    }

    fn recorder_mut(&mut self) -> &mut EventRecorder<AttributeEvent> {
        &mut self.recorder
    }
}

/// Length bounds apply to the upper-cased form.
fn normalize_key(key: &str) -> DomainResult<String> {
    rules::text("key", &rules::normalize(key), MIN_KEY_LEN, MAX_KEY_LEN)
}

fn validate_value(value: &str) -> DomainResult<String> {
    rules::text("value", value, 1, MAX_VALUE_LEN)
}

impl VariantAttribute {
    pub fn create(
        id: VariantAttributeId,
        product_variant_id: ProductVariantId,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let owner = || format!("attribute {id}");
        let key = normalize_key(key).map_err(|e| e.context(owner()))?;
        let value = validate_value(value).map_err(|e| e.context(owner()))?;

        let mut attribute = Self::empty(id);
        attribute.raise(AttributeEvent::AttributeCreated(AttributeCreated {
            attribute_id: id,
            product_variant_id,
            key,
            value,
            occurred_at: now,
        }));
        Ok(attribute)
    }

    pub fn id_typed(&self) -> VariantAttributeId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn product_variant_id(&self) -> Option<ProductVariantId> {
        self.product_variant_id
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
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

    /// Case-insensitive key match.
    pub fn has_key(&self, key: &str) -> bool {
        self.key == rules::normalize(key)
    }

    /// Rename the key. No-op when the normalized key is unchanged.
    pub fn change_key(&mut self, key: &str, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        let key = self.in_context(normalize_key(key))?;
        if key == self.key {
            return Ok(());
        }

        self.raise(AttributeEvent::AttributeKeyChanged(AttributeKeyChanged {
            attribute_id: self.id,
            key,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn change_value(&mut self, value: &str, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        let value = self.in_context(validate_value(value))?;
        if value == self.value {
            return Ok(());
        }

        self.raise(AttributeEvent::AttributeValueChanged(AttributeValueChanged {
            attribute_id: self.id,
            value,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn delete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;

        self.raise(AttributeEvent::AttributeDeleted(AttributeMarked {
            attribute_id: self.id,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn restore(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_created()?;
        if !self.is_deleted {
            return Err(DomainError::invariant(format!(
                "attribute {} is not deleted",
                self.id
            )));
        }

        self.raise(AttributeEvent::AttributeRestored(AttributeMarked {
            attribute_id: self.id,
            occurred_at: now,
        }));
        Ok(())
    }

    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found("variant attribute", self.id));
        }
        Ok(())
    }

    fn in_context<T>(&self, result: DomainResult<T>) -> DomainResult<T> {
        result.map_err(|e| e.context(format!("attribute {}", self.id)))
    }

    fn ensure_active(&self) -> DomainResult<()> {
        self.ensure_created()?;
        if self.is_deleted {
            return Err(DomainError::invariant(format!(
                "attribute {} is deleted",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::AggregateId;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn material() -> VariantAttribute {
        VariantAttribute::create(
            VariantAttributeId::new(AggregateId::new()),
            ProductVariantId::new(),
            "material",
            "leather",
            t(0),
        )
        .unwrap()
    }

    #[test]
    fn create_normalizes_key() {
        let attr = material();
        assert_eq!(attr.key(), "MATERIAL");
        assert_eq!(attr.value(), "leather");
        assert!(attr.has_key("Material"));
        assert_eq!(attr.version(), 1);
    }

    #[test]
    fn change_key_to_same_normalized_key_raises_nothing() {
        let mut attr = material();
        attr.clear_domain_events();

        attr.change_key("MATERIAL", t(1)).unwrap();
        attr.change_key("  Material ", t(1)).unwrap();

        assert!(attr.domain_events().is_empty());
        assert_eq!(attr.version(), 1);
        assert_eq!(attr.updated_at(), None);
    }

    #[test]
    fn change_key_and_value() {
        let mut attr = material();
        attr.change_key("fabric", t(1)).unwrap();
        attr.change_value("cotton", t(2)).unwrap();
        attr.change_value("cotton", t(3)).unwrap();

        assert_eq!(attr.key(), "FABRIC");
        assert_eq!(attr.value(), "cotton");
        assert_eq!(attr.version(), 3);
        assert_eq!(attr.updated_at(), Some(t(2)));
    }

    #[test]
    fn invalid_key_or_value_is_rejected() {
        let id = VariantAttributeId::new(AggregateId::new());
        let variant = ProductVariantId::new();
        assert!(VariantAttribute::create(id, variant, "x", "leather", t(0)).is_err());
        assert!(VariantAttribute::create(id, variant, &"k".repeat(51), "v", t(0)).is_err());
        assert!(VariantAttribute::create(id, variant, "material", "   ", t(0)).is_err());

        let mut attr = material();
        assert!(attr.change_value(&"v".repeat(MAX_VALUE_LEN + 1), t(1)).is_err());
        assert_eq!(attr.version(), 1);
    }

    #[test]
    fn key_length_is_checked_after_upper_casing() {
        let id = VariantAttributeId::new(AggregateId::new());
        let variant = ProductVariantId::new();

        // "ß" upper-cases to "SS"
        let err = VariantAttribute::create(id, variant, &"ß".repeat(30), "v", t(0)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let attr = VariantAttribute::create(id, variant, &"ß".repeat(25), "v", t(0)).unwrap();
        assert_eq!(attr.key().chars().count(), MAX_KEY_LEN);

        let mut attr = material();
        assert!(attr.change_key(&"ß".repeat(26), t(1)).is_err());
        assert_eq!(attr.key(), "MATERIAL");
    }

    #[test]
    fn validation_messages_name_the_attribute() {
        let id = VariantAttributeId::new(AggregateId::new());
        let err =
            VariantAttribute::create(id, ProductVariantId::new(), "x", "v", t(0)).unwrap_err();
        assert_eq!(
            err,
            DomainError::Validation(format!(
                "attribute {id}: key must be {MIN_KEY_LEN}-{MAX_KEY_LEN} characters, got 1 ('X')"
            ))
        );

        let mut attr = material();
        let err = attr.change_value("", t(1)).unwrap_err();
        assert!(err.to_string().contains(&attr.id_typed().to_string()), "{err}");
    }

    #[test]
    fn soft_delete_and_restore() {
        let mut attr = material();
        attr.delete(t(1)).unwrap();
        assert!(attr.is_deleted());
        assert_eq!(attr.deleted_at(), Some(t(1)));

        assert!(attr.change_value("suede", t(2)).is_err());
        assert!(attr.delete(t(2)).is_err());

        attr.restore(t(3)).unwrap();
        assert!(!attr.is_deleted());
        assert_eq!(attr.deleted_at(), None);
        assert!(matches!(
            attr.restore(t(4)).unwrap_err(),
            DomainError::InvariantViolation(_)
        ));
    }

    #[test]
    fn replay_matches_live_state() {
        let mut attr = material();
        attr.change_key("fabric", t(1)).unwrap();
        attr.delete(t(2)).unwrap();
        attr.restore(t(3)).unwrap();

        let replayed =
            VariantAttribute::from_history(attr.id_typed(), attr.domain_events().to_vec()).unwrap();
        assert_eq!(replayed.key(), attr.key());
        assert_eq!(replayed.is_deleted(), attr.is_deleted());
        assert_eq!(replayed.version(), 4);
    }
}
