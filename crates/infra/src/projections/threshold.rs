use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use stockledger_inventory::{
    Alert, Sku, StockMovement, ThresholdStatus, ThresholdTracker, ThresholdTransition,
};

use super::ProjectionError;

/// Which alerts to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Resolved,
}

#[derive(Debug, Default)]
struct SkuAlertState {
    tracker: ThresholdTracker,
    last_sequence: u64,
    /// Index into `MonitorState::alerts` of the open alert.
    open: Option<usize>,
}

#[derive(Debug, Default)]
struct MonitorState {
    skus: HashMap<Sku, SkuAlertState>,
    /// Alert history in commit order (resolved alerts are kept).
    alerts: Vec<Alert>,
}

/// Low-stock monitor: one threshold state machine per SKU plus the alert history.
#[derive(Debug, Default)]
pub struct ThresholdMonitor {
    state: RwLock<MonitorState>,
}

impl ThresholdMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the quantity after a committed movement against `threshold`.
    ///
    /// Returns the transition taken together with the alert it raised or resolved.
    pub(crate) fn evaluate(
        &self,
        movement: &StockMovement,
        threshold: i64,
    ) -> Result<Option<(ThresholdTransition, Alert)>, ProjectionError> {
        let mut guard = self.state.write().map_err(|_| ProjectionError::Poisoned)?;
        let MonitorState { skus, alerts } = &mut *guard;
        let sku_state = skus.entry(movement.sku.clone()).or_default();

        if movement.sequence <= sku_state.last_sequence {
            return Ok(None);
        }
        if movement.sequence != sku_state.last_sequence + 1 {
            return Err(ProjectionError::NonContiguousSequence {
                sku: movement.sku.clone(),
                last: sku_state.last_sequence,
                found: movement.sequence,
            });
        }
        sku_state.last_sequence = movement.sequence;

        let outcome = match sku_state.tracker.evaluate(movement.resulting.quantity, threshold) {
            Some(ThresholdTransition::Raised) => {
                let alert = Alert::raise(threshold, movement);
                sku_state.open = Some(alerts.len());
                alerts.push(alert.clone());
                info!(
                    sku = %movement.sku,
                    quantity = movement.resulting.quantity,
                    threshold,
                    "low-stock alert raised"
                );
                Some((ThresholdTransition::Raised, alert))
            }
            Some(ThresholdTransition::Resolved) => {
                let resolved = sku_state
                    .open
                    .take()
                    .and_then(|idx| alerts.get_mut(idx))
                    .map(|alert| {
                        alert.resolve(movement);
                        alert.clone()
                    });
                info!(
                    sku = %movement.sku,
                    quantity = movement.resulting.quantity,
                    threshold,
                    "low-stock alert resolved"
                );
                resolved.map(|alert| (ThresholdTransition::Resolved, alert))
            }
            None => None,
        };

        Ok(outcome)
    }

    pub fn status(&self, sku: &Sku) -> Result<ThresholdStatus, ProjectionError> {
        let state = self.state.read().map_err(|_| ProjectionError::Poisoned)?;
        Ok(state
            .skus
            .get(sku)
            .map(|st| st.tracker.status())
            .unwrap_or_default())
    }

    pub fn open_alert(&self, sku: &Sku) -> Result<Option<Alert>, ProjectionError> {
        let state = self.state.read().map_err(|_| ProjectionError::Poisoned)?;
        Ok(state
            .skus
            .get(sku)
            .and_then(|st| st.open)
            .and_then(|idx| state.alerts.get(idx).cloned()))
    }

    /// Alerts ordered by trigger time, optionally restricted to open or resolved ones.
    pub fn list(&self, status: Option<AlertStatus>) -> Result<Vec<Alert>, ProjectionError> {
        let state = self.state.read().map_err(|_| ProjectionError::Poisoned)?;

        let mut alerts: Vec<Alert> = state
            .alerts
            .iter()
            .filter(|a| match status {
                Some(AlertStatus::Open) => a.is_open(),
                Some(AlertStatus::Resolved) => !a.is_open(),
                None => true,
            })
            .cloned()
            .collect();
        alerts.sort_by(|a, b| a.triggered_at.cmp(&b.triggered_at).then(a.id.cmp(&b.id)));
        Ok(alerts)
    }

    pub(crate) fn clear(&self) -> Result<(), ProjectionError> {
        *self.state.write().map_err(|_| ProjectionError::Poisoned)? = MonitorState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement_log::in_memory::tests::movement;

    fn moved(sequence: u64, delta: i64, resulting: i64) -> StockMovement {
        let mut m = movement("A", sequence, delta);
        m.resulting.quantity = resulting;
        m
    }

    #[test]
    fn history_is_preserved_across_reentry() {
        let monitor = ThresholdMonitor::new();

        assert!(monitor.evaluate(&moved(1, 50, 50), 10).unwrap().is_none());
        let (t, first) = monitor.evaluate(&moved(2, -45, 5), 10).unwrap().unwrap();
        assert_eq!(t, ThresholdTransition::Raised);
        assert_eq!(monitor.open_alert(&first.sku).unwrap().map(|a| a.id), Some(first.id));

        let (t, resolved) = monitor.evaluate(&moved(3, 20, 25), 10).unwrap().unwrap();
        assert_eq!(t, ThresholdTransition::Resolved);
        assert_eq!(resolved.id, first.id);
        assert!(monitor.open_alert(&first.sku).unwrap().is_none());

        monitor.evaluate(&moved(4, -20, 5), 10).unwrap();

        assert_eq!(monitor.list(None).unwrap().len(), 2);
        assert_eq!(monitor.list(Some(AlertStatus::Open)).unwrap().len(), 1);
        assert_eq!(monitor.list(Some(AlertStatus::Resolved)).unwrap()[0].id, first.id);
        assert_eq!(monitor.status(&first.sku).unwrap(), ThresholdStatus::Alerted);
    }

    #[test]
    fn redelivered_movement_does_not_raise_twice() {
        let monitor = ThresholdMonitor::new();
        let m = moved(1, 5, 5);
        assert!(monitor.evaluate(&m, 10).unwrap().is_some());
        assert!(monitor.evaluate(&m, 10).unwrap().is_none());
        assert_eq!(monitor.list(None).unwrap().len(), 1);
    }
}
