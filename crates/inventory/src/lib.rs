//! Inventory ledger domain (event-sourced).
//!
//! This crate contains the business rules of the stock ledger, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage): product references,
//! stock movements, the non-negative stock rule, costing books and the low-stock
//! threshold state machine.

pub mod costing;
pub mod movement;
pub mod position;
pub mod product;
pub mod threshold;

pub use costing::{
    CostBook, CostLayer, CostedMovement, CostingMethod, FifoBook, WeightedAverageBook,
};
pub use movement::{
    AdjustmentDirection, MovementKind, PositionSnapshot, RecordMovement, StockMovement,
};
pub use position::{InventoryPosition, StockLevel, check_stock};
pub use product::{BackorderPolicy, Product, Sku};
pub use threshold::{Alert, ThresholdStatus, ThresholdTracker, ThresholdTransition};
