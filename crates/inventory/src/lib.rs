//! Inventory domain module (event-sourced).
//!
//! This crate contains the per-variant stock ledger, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod stock;

pub use stock::{
    MAX_WRITE_OFF_REASON_LEN, SaleReturned, StockAdded, StockCreated, StockEvent, StockSold,
    StockWrittenOff, VariantStock, VariantStockId,
};
