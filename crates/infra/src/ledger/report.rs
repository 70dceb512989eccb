use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::MovementId;
use stockledger_inventory::{
    CostingMethod, InventoryPosition, PositionSnapshot, Product, Sku, StockMovement,
};

/// Outcome of `record_movement`. Replays of an idempotency key return an identical
/// value, derived from the committed movement alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementResult {
    pub movement: StockMovement,
    pub position: PositionSnapshot,
}

impl From<StockMovement> for MovementResult {
    fn from(movement: StockMovement) -> Self {
        Self {
            position: movement.resulting,
            movement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSort {
    #[default]
    Sku,
    Quantity,
    Valuation,
}

/// Listing options for `list_positions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionQuery {
    /// Case-insensitive category match.
    pub category: Option<String>,
    pub sort: PositionSort,
    pub descending: bool,
}

/// One product's position together with its catalog reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReportLine {
    pub sku: Sku,
    pub name: String,
    pub category: Option<String>,
    pub reorder_threshold: i64,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub valuation: Decimal,
    pub last_movement_id: Option<MovementId>,
}

impl StockReportLine {
    pub fn new(product: &Product, position: &InventoryPosition) -> Self {
        Self {
            sku: product.sku.clone(),
            name: product.name.clone(),
            category: product.category.clone(),
            reorder_threshold: product.reorder_threshold,
            quantity: position.quantity,
            unit_cost: position.unit_cost,
            valuation: position.valuation,
            last_movement_id: position.last_movement_id,
        }
    }

    pub fn is_low(&self) -> bool {
        self.quantity <= self.reorder_threshold
    }
}

pub(crate) fn sort_lines(lines: &mut [StockReportLine], query: &PositionQuery) {
    match query.sort {
        PositionSort::Sku => lines.sort_by(|a, b| a.sku.cmp(&b.sku)),
        PositionSort::Quantity => lines.sort_by(|a, b| a.quantity.cmp(&b.quantity).then(a.sku.cmp(&b.sku))),
        PositionSort::Valuation => {
            lines.sort_by(|a, b| a.valuation.cmp(&b.valuation).then(a.sku.cmp(&b.sku)))
        }
    }
    if query.descending {
        lines.reverse();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationReport {
    pub method: CostingMethod,
    pub total: Decimal,
    pub lines: Vec<StockReportLine>,
}
