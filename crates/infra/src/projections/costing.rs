use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;

use stockledger_inventory::{
    BackorderPolicy, CostBook, CostLayer, CostedMovement, CostingMethod, PositionSnapshot, Sku,
    StockMovement,
};

use super::ProjectionError;

#[derive(Debug, Clone)]
struct CostState {
    last_sequence: u64,
    book: CostBook,
}

/// Cost books per SKU under the deployment's costing method.
#[derive(Debug)]
pub struct CostingEngine {
    method: CostingMethod,
    books: RwLock<HashMap<Sku, CostState>>,
}

impl CostingEngine {
    pub fn new(method: CostingMethod) -> Self {
        Self {
            method,
            books: RwLock::new(HashMap::new()),
        }
    }

    pub fn method(&self) -> CostingMethod {
        self.method
    }

    /// Current book for a SKU (an empty book when the SKU was never moved).
    pub fn book(&self, sku: &Sku) -> Result<CostBook, ProjectionError> {
        let books = self.books.read().map_err(|_| ProjectionError::Poisoned)?;
        Ok(books
            .get(sku)
            .map(|s| s.book.clone())
            .unwrap_or_else(|| CostBook::new(self.method)))
    }

    pub fn valuation(&self, sku: &Sku) -> Result<Decimal, ProjectionError> {
        Ok(self.book(sku)?.valuation())
    }

    pub fn unit_cost(&self, sku: &Sku) -> Result<Decimal, ProjectionError> {
        Ok(self.book(sku)?.unit_cost())
    }

    /// FIFO layers, oldest first (empty under weighted-average costing).
    pub fn layers(&self, sku: &Sku) -> Result<Vec<CostLayer>, ProjectionError> {
        Ok(self.book(sku)?.layers())
    }

    /// Sum of all per-SKU valuations.
    pub fn total_valuation(&self) -> Result<Decimal, ProjectionError> {
        let books = self.books.read().map_err(|_| ProjectionError::Poisoned)?;
        books.values().try_fold(Decimal::ZERO, |total, state| {
            total
                .checked_add(state.book.valuation())
                .ok_or(ProjectionError::ValuationOverflow)
        })
    }

    /// Cost a prospective movement against the current book without applying it.
    pub fn preview(
        &self,
        sku: &Sku,
        delta: i64,
        incoming_cost: Option<Decimal>,
        backorder: BackorderPolicy,
    ) -> Result<(CostedMovement, PositionSnapshot), ProjectionError> {
        Ok(self.book(sku)?.preview(delta, incoming_cost, backorder)?)
    }

    /// Apply a committed movement. Returns `false` when it was already applied.
    pub(crate) fn apply(&self, movement: &StockMovement) -> Result<bool, ProjectionError> {
        let mut books = self.books.write().map_err(|_| ProjectionError::Poisoned)?;
        let state = books
            .entry(movement.sku.clone())
            .or_insert_with(|| CostState {
                last_sequence: 0,
                book: CostBook::new(self.method),
            });

        if movement.sequence <= state.last_sequence {
            return Ok(false);
        }
        if movement.sequence != state.last_sequence + 1 {
            return Err(ProjectionError::NonContiguousSequence {
                sku: movement.sku.clone(),
                last: state.last_sequence,
                found: movement.sequence,
            });
        }

        state.book.apply(movement)?;
        state.last_sequence = movement.sequence;
        Ok(true)
    }

    /// All books, ordered by SKU.
    pub fn books(&self) -> Result<Vec<(Sku, CostBook)>, ProjectionError> {
        let books = self.books.read().map_err(|_| ProjectionError::Poisoned)?;
        let mut out: Vec<_> = books.iter().map(|(k, s)| (k.clone(), s.book.clone())).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    pub(crate) fn clear(&self) -> Result<(), ProjectionError> {
        self.books
            .write()
            .map_err(|_| ProjectionError::Poisoned)?
            .clear();
        Ok(())
    }
}
