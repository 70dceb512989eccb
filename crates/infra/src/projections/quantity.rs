use std::collections::HashMap;
use std::sync::RwLock;

use stockledger_inventory::{BackorderPolicy, Sku, StockLevel, StockMovement, check_stock};

use super::ProjectionError;

/// Running on-hand quantity per SKU.
///
/// Fed only by the ledger after a successful append (or by a replay of the log).
/// Each SKU carries a sequence cursor: re-delivered movements at or below the cursor
/// are ignored, gaps are rejected.
#[derive(Debug, Default)]
pub struct QuantityProjector {
    levels: RwLock<HashMap<Sku, StockLevel>>,
}

impl QuantityProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_quantity(&self, sku: &Sku) -> Result<i64, ProjectionError> {
        Ok(self.level(sku)?.map(|l| l.quantity).unwrap_or(0))
    }

    pub fn level(&self, sku: &Sku) -> Result<Option<StockLevel>, ProjectionError> {
        let levels = self.levels.read().map_err(|_| ProjectionError::Poisoned)?;
        Ok(levels.get(sku).cloned())
    }

    /// Stock rule against the current projected quantity.
    pub fn check(
        &self,
        sku: &Sku,
        delta: i64,
        backorder: BackorderPolicy,
    ) -> Result<i64, ProjectionError> {
        Ok(check_stock(self.current_quantity(sku)?, delta, backorder)?)
    }

    /// Apply a committed movement. Returns `false` when it was already applied.
    pub(crate) fn apply(&self, movement: &StockMovement) -> Result<bool, ProjectionError> {
        let mut levels = self.levels.write().map_err(|_| ProjectionError::Poisoned)?;
        let level = levels.entry(movement.sku.clone()).or_default();

        if movement.sequence <= level.last_sequence {
            return Ok(false);
        }
        if movement.sequence != level.last_sequence + 1 {
            return Err(ProjectionError::NonContiguousSequence {
                sku: movement.sku.clone(),
                last: level.last_sequence,
                found: movement.sequence,
            });
        }

        level.apply(movement)?;
        Ok(true)
    }

    /// All tracked SKUs with their levels, ordered by SKU.
    pub fn levels(&self) -> Result<Vec<(Sku, StockLevel)>, ProjectionError> {
        let levels = self.levels.read().map_err(|_| ProjectionError::Poisoned)?;
        let mut out: Vec<_> = levels.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    pub(crate) fn clear(&self) -> Result<(), ProjectionError> {
        self.levels
            .write()
            .map_err(|_| ProjectionError::Poisoned)?
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::DomainError;
    use crate::movement_log::in_memory::tests::movement;

    #[test]
    fn redelivery_is_ignored_and_gaps_rejected() {
        let projector = QuantityProjector::new();
        let first = movement("A", 1, 10);

        assert!(projector.apply(&first).unwrap());
        assert!(!projector.apply(&first).unwrap());
        assert_eq!(projector.current_quantity(&first.sku).unwrap(), 10);

        let err = projector.apply(&movement("A", 3, 1)).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::NonContiguousSequence { last: 1, found: 3, .. }
        ));
    }

    #[test]
    fn check_uses_projected_quantity() {
        let projector = QuantityProjector::new();
        let sku = Sku::parse("A").unwrap();
        projector.apply(&movement("A", 1, 40)).unwrap();

        assert_eq!(projector.check(&sku, -30, BackorderPolicy::Disallowed).unwrap(), 10);
        assert!(matches!(
            projector.check(&sku, -41, BackorderPolicy::Disallowed),
            Err(ProjectionError::Domain(DomainError::InsufficientStock { available: 40, requested: 41 }))
        ));
        assert_eq!(
            projector
                .check(&Sku::parse("NEW").unwrap(), 5, BackorderPolicy::Disallowed)
                .unwrap(),
            5
        );
    }

    #[test]
    fn poisoned_levels_surface_as_errors() {
        let projector = std::sync::Arc::new(QuantityProjector::new());
        let poisoner = projector.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.levels.write().unwrap();
            panic!("poison the quantity lock");
        })
        .join();

        assert!(matches!(projector.levels(), Err(ProjectionError::Poisoned)));
        assert!(matches!(
            projector.current_quantity(&Sku::parse("A").unwrap()),
            Err(ProjectionError::Poisoned)
        ));
    }
}
