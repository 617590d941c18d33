use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalog_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, EventRecorder, ProductVariantId, rules,
};
use catalog_events::Event;

use crate::ids::VariantPriceId;

/// ISO-4217 currency code, stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn parse(code: &str) -> DomainResult<Self> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::validation(format!(
                "currency must be a three-letter ISO code, got '{code}'"
            )));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the price history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChange {
    /// Amount in minor currency units (e.g. cents).
    pub amount: i64,
    pub currency: Currency,
    pub effective_from: DateTime<Utc>,
}

/// Aggregate root: VariantPrice.
///
/// Current price of a variant plus the full history of prices it has had.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPrice {
    id: VariantPriceId,
    variant_id: Option<ProductVariantId>,
    history: Vec<PriceChange>,
    created: bool,
    recorder: EventRecorder<PriceEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceCreated {
    pub price_id: VariantPriceId,
    pub variant_id: ProductVariantId,
    pub amount: i64,
    pub currency: Currency,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChanged {
    pub price_id: VariantPriceId,
    pub amount: i64,
    pub currency: Currency,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PriceEvent {
    PriceCreated(PriceCreated),
    PriceChanged(PriceChanged),
}

impl Event for PriceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PriceEvent::PriceCreated(_) => "catalog.price.created",
            PriceEvent::PriceChanged(_) => "catalog.price.changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PriceEvent::PriceCreated(e) => e.occurred_at,
            PriceEvent::PriceChanged(e) => e.occurred_at,
        }
    }
}

impl AggregateRoot for VariantPrice {
    type Id = VariantPriceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.recorder.version()
    }
}

impl Aggregate for VariantPrice {
    type Event = PriceEvent;
    const AGGREGATE_TYPE: &'static str = "catalog.variant_price";

    fn empty(id: VariantPriceId) -> Self {
        Self {
            id,
            variant_id: None,
            history: Vec::new(),
            created: false,
            recorder: EventRecorder::new(),
        }
    }

    fn apply(&mut self, event: &PriceEvent) {
        match event {
            PriceEvent::PriceCreated(e) => {
                self.id = e.price_id;
                self.variant_id = Some(e.variant_id);
                self.history = vec![PriceChange {
                    amount: e.amount,
                    currency: e.currency.clone(),
                    effective_from: e.occurred_at,
                }];
                self.created = true;
            }
            PriceEvent::PriceChanged(e) => {
                self.history.push(PriceChange {
                    amount: e.amount,
                    currency: e.currency.clone(),
                    effective_from: e.occurred_at,
                });
            }
        }
    }

    fn recorder(&self) -> &EventRecorder<PriceEvent> {
        &self.recorder
    }

    fn recorder_mut(&mut self) -> &mut EventRecorder<PriceEvent> {
        &mut self.recorder
    }
}

impl VariantPrice {
    pub fn create(
        id: VariantPriceId,
        variant_id: ProductVariantId,
        amount: i64,
        currency: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let owner = || format!("price {id}");
        rules::positive("amount", amount).map_err(|e| e.context(owner()))?;
        let currency = Currency::parse(currency).map_err(|e| e.context(owner()))?;

        let mut price = Self::empty(id);
        price.raise(PriceEvent::PriceCreated(PriceCreated {
            price_id: id,
            variant_id,
            amount,
            currency,
            occurred_at: now,
        }));
        Ok(price)
    }

    pub fn id_typed(&self) -> VariantPriceId {
        self.id
    }

    pub fn variant_id(&self) -> Option<ProductVariantId> {
        self.variant_id
    }

    /// Price in effect now (the latest history entry).
    pub fn current(&self) -> Option<&PriceChange> {
        self.history.last()
    }

    pub fn history(&self) -> &[PriceChange] {
        &self.history
    }

    /// Price that was in effect at `at`, if the variant was priced by then.
    pub fn price_at(&self, at: DateTime<Utc>) -> Option<&PriceChange> {
        self.history.iter().rev().find(|p| p.effective_from <= at)
    }

    /// Change the amount in the current currency. No-op when unchanged.
    pub fn change_price(&mut self, amount: i64, now: DateTime<Utc>) -> DomainResult<()> {
        let current = self.current_or_not_found()?.currency.clone();
        self.change(amount, current, now)
    }

    /// Switch currency, which always comes with a new amount.
    pub fn change_currency(
        &mut self,
        currency: &str,
        amount: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.current_or_not_found()?;
        let currency = self.in_context(Currency::parse(currency))?;
        self.change(amount, currency, now)
    }

    fn change(&mut self, amount: i64, currency: Currency, now: DateTime<Utc>) -> DomainResult<()> {
        self.in_context(rules::positive("amount", amount))?;
        let current = self.current_or_not_found()?;
        if current.amount == amount && current.currency == currency {
            return Ok(());
        }

        self.raise(PriceEvent::PriceChanged(PriceChanged {
            price_id: self.id,
            amount,
            currency,
            occurred_at: now,
        }));
        Ok(())
    }

    fn in_context<T>(&self, result: DomainResult<T>) -> DomainResult<T> {
        result.map_err(|e| e.context(format!("price {}", self.id)))
    }

    fn current_or_not_found(&self) -> DomainResult<&PriceChange> {
        if !self.created {
            return Err(DomainError::not_found("variant price", self.id));
        }
        self.current()
            .ok_or_else(|| DomainError::not_found("variant price", self.id))
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

    fn priced(amount: i64) -> VariantPrice {
        VariantPrice::create(
            VariantPriceId::new(AggregateId::new()),
            ProductVariantId::new(),
            amount,
            "usd",
            t(0),
        )
        .unwrap()
    }

    #[test]
    fn create_records_first_history_entry() {
        let price = priced(1999);
        let current = price.current().unwrap();
        assert_eq!(current.amount, 1999);
        assert_eq!(current.currency.as_str(), "USD");
        assert_eq!(price.history().len(), 1);
    }

    #[test]
    fn create_validates_amount_and_currency() {
        let id = VariantPriceId::new(AggregateId::new());
        let variant = ProductVariantId::new();
        assert!(VariantPrice::create(id, variant, 0, "USD", t(0)).is_err());
        assert!(VariantPrice::create(id, variant, 100, "US", t(0)).is_err());
        assert!(VariantPrice::create(id, variant, 100, "U$D", t(0)).is_err());

        let err = VariantPrice::create(id, variant, -5, "USD", t(0)).unwrap_err();
        assert_eq!(
            err,
            DomainError::Validation(format!("price {id}: amount must be greater than zero, got -5"))
        );
    }

    #[test]
    fn change_price_appends_history_and_skips_noops() {
        let mut price = priced(1000);
        price.change_price(1000, t(1)).unwrap();
        assert_eq!(price.version(), 1);

        price.change_price(1200, t(2)).unwrap();
        price.change_currency("eur", 1100, t(3)).unwrap();
        assert_eq!(price.version(), 3);

        let amounts: Vec<i64> = price.history().iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![1000, 1200, 1100]);
        assert_eq!(price.current().unwrap().currency.as_str(), "EUR");
    }

    #[test]
    fn price_at_looks_back_in_history() {
        let mut price = priced(1000);
        price.change_price(800, t(10)).unwrap();

        assert_eq!(price.price_at(t(5)).unwrap().amount, 1000);
        assert_eq!(price.price_at(t(10)).unwrap().amount, 800);
        assert!(price.price_at(t(-1)).is_none());
    }

    #[test]
    fn invalid_change_leaves_state_unchanged() {
        let mut price = priced(1000);
        assert!(price.change_price(-5, t(1)).is_err());
        assert!(price.change_currency("euro", 100, t(1)).is_err());
        assert_eq!(price.history().len(), 1);
        assert_eq!(price.version(), 1);
    }

    #[test]
    fn replay_rebuilds_history() {
        let mut price = priced(1000);
        price.change_price(900, t(1)).unwrap();
        let replayed =
            VariantPrice::from_history(price.id_typed(), price.domain_events().to_vec()).unwrap();
        assert_eq!(replayed.history(), price.history());
    }
}
