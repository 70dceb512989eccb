use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, MovementId};

use crate::costing::CostBook;
use crate::movement::StockMovement;
use crate::product::{BackorderPolicy, Sku};

/// The non-negative stock rule.
///
/// Returns the quantity after applying `delta` to `available`, or
/// `InsufficientStock` when a decrease would leave the product below zero and
/// backorders are disallowed. Increases are always accepted, even when stock is
/// already negative.
pub fn check_stock(available: i64, delta: i64, backorder: BackorderPolicy) -> DomainResult<i64> {
    let next = available
        .checked_add(delta)
        .ok_or_else(|| DomainError::validation("quantity overflow"))?;

    if delta < 0 && next < 0 && !backorder.allows_negative() {
        return Err(DomainError::insufficient_stock(available, -delta));
    }

    Ok(next)
}

/// Running on-hand quantity for one SKU (state of the quantity projection).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StockLevel {
    pub quantity: i64,
    /// Sequence of the last applied movement (0 when nothing was applied yet).
    pub last_sequence: u64,
    pub last_movement_id: Option<MovementId>,
    pub last_recorded_at: Option<DateTime<Utc>>,
}

impl StockLevel {
    /// Apply a committed movement. Sequences must be contiguous.
    pub fn apply(&mut self, movement: &StockMovement) -> DomainResult<()> {
        if movement.sequence != self.last_sequence + 1 {
            return Err(DomainError::invariant(format!(
                "non-contiguous sequence for {} (last={}, found={})",
                movement.sku, self.last_sequence, movement.sequence
            )));
        }

        self.quantity = self
            .quantity
            .checked_add(movement.delta)
            .ok_or_else(|| DomainError::invariant("quantity overflow"))?;
        self.last_sequence = movement.sequence;
        self.last_movement_id = Some(movement.id);
        self.last_recorded_at = Some(movement.recorded_at);
        Ok(())
    }
}

/// Current position of a SKU as served to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryPosition {
    pub sku: Sku,
    pub quantity: i64,
    /// Current cost basis (weighted average, or FIFO blended cost).
    pub unit_cost: Decimal,
    pub valuation: Decimal,
    pub last_movement_id: Option<MovementId>,
    pub last_sequence: u64,
}

impl InventoryPosition {
    pub fn empty(sku: Sku) -> Self {
        Self {
            sku,
            quantity: 0,
            unit_cost: Decimal::ZERO,
            valuation: Decimal::ZERO,
            last_movement_id: None,
            last_sequence: 0,
        }
    }

    pub fn from_parts(sku: Sku, level: &StockLevel, book: &CostBook) -> Self {
        Self {
            sku,
            quantity: level.quantity,
            unit_cost: book.unit_cost(),
            valuation: book.valuation(),
            last_movement_id: level.last_movement_id,
            last_sequence: level.last_sequence,
        }
    }
}
