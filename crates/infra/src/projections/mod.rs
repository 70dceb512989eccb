//! Projections (derived state) over the movement log.
//!
//! Projections are:
//! - **Rebuildable**: can be reconstructed by replaying the log from the beginning
//! - **Idempotent**: a per-SKU sequence cursor ignores re-delivered movements
//! - **Fed by the ledger only**: `apply` is crate-private

pub mod costing;
pub mod quantity;
pub mod threshold;

use thiserror::Error;

use stockledger_core::DomainError;
use stockledger_inventory::Sku;

pub use costing::CostingEngine;
pub use quantity::QuantityProjector;
pub use threshold::{AlertStatus, ThresholdMonitor};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("non-contiguous sequence for {sku} (last={last}, found={found})")]
    NonContiguousSequence { sku: Sku, last: u64, found: u64 },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("projection lock poisoned")]
    Poisoned,

    #[error("total valuation exceeds the representable range")]
    ValuationOverflow,
}
