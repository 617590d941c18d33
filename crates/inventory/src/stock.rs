use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use catalog_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, EventRecorder,
    ProductVariantId, rules,
};
use catalog_events::Event;

/// Maximum length of a write-off reason.
pub const MAX_WRITE_OFF_REASON_LEN: usize = 500;

/// Variant stock identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantStockId(pub AggregateId);

impl VariantStockId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for VariantStockId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for VariantStockId {
    fn from(value: Uuid) -> Self {
        Self(AggregateId::from_uuid(value))
    }
}

impl From<VariantStockId> for AggregateId {
    fn from(value: VariantStockId) -> Self {
        value.0
    }
}

/// Aggregate root: VariantStock.
///
/// Inventory ledger for exactly one variant. `in_stock` and `sales` never go
/// negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantStock {
    id: VariantStockId,
    variant_id: Option<ProductVariantId>,
    in_stock: i64,
    sales: i64,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    created: bool,
    recorder: EventRecorder<StockEvent>,
}

/// Event: StockCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCreated {
    pub stock_id: VariantStockId,
    pub variant_id: ProductVariantId,
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdded {
    pub stock_id: VariantStockId,
    pub count: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockWrittenOff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockWrittenOff {
    pub stock_id: VariantStockId,
    pub reason: String,
    pub count: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockSold. One event moves units from `in_stock` to `sales`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSold {
    pub stock_id: VariantStockId,
    pub count: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleReturned. Moves units back from `sales` to `in_stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReturned {
    pub stock_id: VariantStockId,
    pub count: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StockEvent {
    StockCreated(StockCreated),
    StockAdded(StockAdded),
    StockWrittenOff(StockWrittenOff),
    StockSold(StockSold),
    SaleReturned(SaleReturned),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockCreated(_) => "catalog.stock.created",
            StockEvent::StockAdded(_) => "catalog.stock.added",
            StockEvent::StockWrittenOff(_) => "catalog.stock.written_off",
            StockEvent::StockSold(_) => "catalog.stock.sold",
            StockEvent::SaleReturned(_) => "catalog.stock.sale_returned",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::StockCreated(e) => e.occurred_at,
            StockEvent::StockAdded(e) => e.occurred_at,
            StockEvent::StockWrittenOff(e) => e.occurred_at,
            StockEvent::StockSold(e) => e.occurred_at,
            StockEvent::SaleReturned(e) => e.occurred_at,
        }
    }
}

impl AggregateRoot for VariantStock {
    type Id = VariantStockId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.recorder.version()
    }
}

impl Aggregate for VariantStock {
    type Event = StockEvent;
    const AGGREGATE_TYPE: &'static str = "catalog.variant_stock";

    fn empty(id: VariantStockId) -> Self {
        Self {
            id,
            variant_id: None,
            in_stock: 0,
            sales: 0,
            created_at: DateTime::<Utc>::default(),
            updated_at: None,
            created: false,
            recorder: EventRecorder::new(),
        }
    }

    fn apply(&mut self, event: &StockEvent) {
        match event {
            StockEvent::StockCreated(e) => {
                self.id = e.stock_id;
                self.variant_id = Some(e.variant_id);
                self.in_stock = e.initial_stock;
                self.sales = 0;
                self.created_at = e.occurred_at;
                self.created = true;
            }
            StockEvent::StockAdded(e) => {
                self.in_stock += e.count;
                self.updated_at = Some(e.occurred_at);
            }
            StockEvent::StockWrittenOff(e) => {
                self.in_stock -= e.count;
                self.updated_at = Some(e.occurred_at);
            }
            StockEvent::StockSold(e) => {
                self.in_stock -= e.count;
                self.sales += e.count;
                self.updated_at = Some(e.occurred_at);
            }
            StockEvent::SaleReturned(e) => {
                self.in_stock += e.count;
                self.sales -= e.count;
                self.updated_at = Some(e.occurred_at);
            }
        }
    }

    fn recorder(&self) -> &EventRecorder<StockEvent> {
        &self.recorder
    }

    fn recorder_mut(&mut self) -> &mut EventRecorder<StockEvent> {
        &mut self.recorder
    }
}

impl VariantStock {
    /// Open the ledger for a variant with `initial_stock >= 0` units.
    pub fn create(
        id: VariantStockId,
        variant_id: ProductVariantId,
        initial_stock: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        rules::non_negative("initial_stock", initial_stock)
            .map_err(|e| e.context(format!("stock {id}")))?;

        let mut stock = Self::empty(id);
        stock.raise(StockEvent::StockCreated(StockCreated {
            stock_id: id,
            variant_id,
            initial_stock,
            occurred_at: now,
        }));
        Ok(stock)
    }

    pub fn id_typed(&self) -> VariantStockId {
        self.id
    }

    pub fn variant_id(&self) -> Option<ProductVariantId> {
        self.variant_id
    }

    pub fn in_stock(&self) -> i64 {
        self.in_stock
    }

    pub fn sales(&self) -> i64 {
        self.sales
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Whether `count` units could be sold or written off right now.
    pub fn can_decrease(&self, count: i64) -> bool {
        count > 0 && count <= self.in_stock
    }

    pub fn add_to_stock(&mut self, count: i64, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_created()?;
        self.in_context(rules::positive("count", count))?;
        self.in_context(rules::checked_add("in_stock", self.in_stock, count))?;

        self.raise(StockEvent::StockAdded(StockAdded {
            stock_id: self.id,
            count,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn write_off(
        &mut self,
        reason: &str,
        count: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_created()?;
        let reason =
            self.in_context(rules::text("reason", reason, 1, MAX_WRITE_OFF_REASON_LEN))?;
        self.ensure_decrease(count)?;

        self.raise(StockEvent::StockWrittenOff(StockWrittenOff {
            stock_id: self.id,
            reason,
            count,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn sell(&mut self, count: i64, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_created()?;
        self.ensure_decrease(count)?;
        self.in_context(rules::checked_add("sales", self.sales, count))?;

        self.raise(StockEvent::StockSold(StockSold {
            stock_id: self.id,
            count,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn return_sale(&mut self, count: i64, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_created()?;
        self.in_context(rules::positive("count", count))?;
        if count > self.sales {
            return Err(DomainError::invariant(format!(
                "stock {}: returned count {count} exceeds sales {}",
                self.id, self.sales
            )));
        }
        self.in_context(rules::checked_add("in_stock", self.in_stock, count))?;

        self.raise(StockEvent::SaleReturned(SaleReturned {
            stock_id: self.id,
            count,
            occurred_at: now,
        }));
        Ok(())
    }

    /// Tag a validation result with this ledger's id.
    fn in_context<T>(&self, result: DomainResult<T>) -> DomainResult<T> {
        result.map_err(|e| e.context(format!("stock {}", self.id)))
    }

    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found("variant stock", self.id));
        }
        Ok(())
    }

    fn ensure_decrease(&self, count: i64) -> DomainResult<()> {
        self.in_context(rules::positive("count", count))?;
        if count > self.in_stock {
            return Err(DomainError::invariant(format!(
                "stock {}: count {count} exceeds available {}",
                self.id, self.in_stock
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn test_stock_id() -> VariantStockId {
        VariantStockId::new(AggregateId::new())
    }

    fn stock_with(initial: i64) -> VariantStock {
        VariantStock::create(test_stock_id(), ProductVariantId::new(), initial, t(0)).unwrap()
    }

    #[test]
    fn create_sets_initial_stock() {
        let stock = stock_with(10);
        assert_eq!(stock.in_stock(), 10);
        assert_eq!(stock.sales(), 0);
        assert_eq!(stock.version(), 1);
        assert!(stock.variant_id().is_some());
    }

    #[test]
    fn create_rejects_negative_initial_stock() {
        let err = VariantStock::create(test_stock_id(), ProductVariantId::new(), -1, t(0))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn sell_moves_units_to_sales_in_one_event() {
        let mut stock = stock_with(10);
        stock.sell(3, t(1)).unwrap();

        assert_eq!(stock.in_stock(), 7);
        assert_eq!(stock.sales(), 3);
        assert_eq!(stock.version(), 2);
        assert!(matches!(stock.domain_events()[1], StockEvent::StockSold(_)));
    }

    #[test]
    fn sell_more_than_available_is_rejected() {
        let mut stock = stock_with(10);
        stock.sell(3, t(1)).unwrap();

        let err = stock.sell(8, t(2)).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => {
                assert!(msg.contains("exceeds available 7"), "{msg}")
            }
            other => panic!("expected InvariantViolation, got {other:?}"),
        }
        assert_eq!(stock.in_stock(), 7);
        assert_eq!(stock.version(), 2);
    }

    #[test]
    fn non_positive_counts_are_rejected() {
        let mut stock = stock_with(5);
        assert!(stock.add_to_stock(0, t(1)).is_err());
        assert!(stock.sell(-1, t(1)).is_err());
        assert!(stock.write_off("damaged", 0, t(1)).is_err());
        assert!(stock.return_sale(0, t(1)).is_err());
        assert_eq!(stock.version(), 1);
    }

    #[test]
    fn validation_messages_name_the_stock() {
        let mut stock = stock_with(5);
        let expected = format!("stock {}: ", stock.id_typed());

        for err in [
            stock.add_to_stock(0, t(1)).unwrap_err(),
            stock.sell(-2, t(1)).unwrap_err(),
            stock.write_off("", 1, t(1)).unwrap_err(),
        ] {
            match err {
                DomainError::Validation(msg) => assert!(msg.starts_with(&expected), "{msg}"),
                other => panic!("expected Validation, got {other:?}"),
            }
        }
    }

    #[test]
    fn add_to_stock_and_write_off() {
        let mut stock = stock_with(0);
        stock.add_to_stock(20, t(1)).unwrap();
        stock.write_off("water damage", 5, t(2)).unwrap();
        assert_eq!(stock.in_stock(), 15);
        assert_eq!(stock.updated_at(), Some(t(2)));

        assert!(stock.write_off("lost", 16, t(3)).is_err());
        assert!(stock.write_off("   ", 1, t(3)).is_err());
        assert_eq!(stock.in_stock(), 15);
    }

    #[test]
    fn add_to_stock_rejects_overflow() {
        let mut stock = stock_with(i64::MAX - 1);
        let err = stock.add_to_stock(2, t(1)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn return_sale_is_bounded_by_sales() {
        let mut stock = stock_with(10);
        stock.sell(4, t(1)).unwrap();
        stock.return_sale(3, t(2)).unwrap();
        assert_eq!(stock.in_stock(), 9);
        assert_eq!(stock.sales(), 1);

        assert!(stock.return_sale(2, t(3)).is_err());
        assert_eq!(stock.sales(), 1);
    }

    #[test]
    fn can_decrease_is_pure() {
        let stock = stock_with(3);
        assert!(stock.can_decrease(3));
        assert!(!stock.can_decrease(4));
        assert!(!stock.can_decrease(0));
        assert_eq!(stock.version(), 1);
        assert_eq!(stock.domain_events().len(), 1);
    }

    #[test]
    fn uncreated_stock_is_not_found() {
        let mut stock = VariantStock::empty(test_stock_id());
        assert!(matches!(
            stock.add_to_stock(1, t(0)).unwrap_err(),
            DomainError::NotFound { .. }
        ));
    }

    #[test]
    fn replay_matches_live_state() {
        let mut stock = stock_with(10);
        stock.sell(2, t(1)).unwrap();
        stock.add_to_stock(5, t(2)).unwrap();
        stock.return_sale(1, t(3)).unwrap();
        stock.write_off("expired", 4, t(4)).unwrap();

        let history = stock.domain_events().to_vec();
        let replayed = VariantStock::from_history(stock.id_typed(), history).unwrap();

        assert_eq!(replayed.in_stock(), stock.in_stock());
        assert_eq!(replayed.sales(), stock.sales());
        assert_eq!(replayed.version(), 5);
        assert!(replayed.domain_events().is_empty());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Add(i64),
            Sell(i64),
            WriteOff(i64),
            Return(i64),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (-5i64..50).prop_map(Op::Add),
                (-5i64..50).prop_map(Op::Sell),
                (-5i64..50).prop_map(Op::WriteOff),
                (-5i64..50).prop_map(Op::Return),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: no sequence of calls can drive stock or sales negative,
            /// and failed calls raise nothing.
            #[test]
            fn stock_and_sales_never_negative(
                initial in 0i64..100,
                ops in prop::collection::vec(op(), 0..60)
            ) {
                let mut stock = stock_with(initial);
                for (i, op) in ops.iter().enumerate() {
                    let now = t(i as i64 + 1);
                    let version = stock.version();
                    let result = match op {
                        Op::Add(n) => stock.add_to_stock(*n, now),
                        Op::Sell(n) => stock.sell(*n, now),
                        Op::WriteOff(n) => stock.write_off("audit", *n, now),
                        Op::Return(n) => stock.return_sale(*n, now),
                    };
                    match result {
                        Ok(()) => prop_assert_eq!(stock.version(), version + 1),
                        Err(_) => prop_assert_eq!(stock.version(), version),
                    }
                    prop_assert!(stock.in_stock() >= 0);
                    prop_assert!(stock.sales() >= 0);
                }

                let replayed = VariantStock::from_history(
                    stock.id_typed(),
                    stock.domain_events().to_vec(),
                ).unwrap();
                prop_assert_eq!(replayed.in_stock(), stock.in_stock());
                prop_assert_eq!(replayed.sales(), stock.sales());
            }
        }
    }
}
