//! Infrastructure layer: movement log, projections, ledger orchestration.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod ledger;
pub mod movement_log;
pub mod projections;
pub mod replay;


pub use catalog::{FileProductCatalog, InMemoryProductCatalog, ProductCatalog};
pub use config::{ConfigError, LedgerConfig};
pub use ledger::{InventoryLedger, LedgerError, LedgerEvent};
pub use movement_log::{InMemoryMovementStore, JournalMovementStore, MovementStore};
