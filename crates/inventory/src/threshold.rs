//! Low-stock threshold state machine.
//!
//! Each SKU is either `Ok` or `Alerted`. A committed movement that takes the quantity
//! to or below the reorder threshold raises an alert; a later movement that takes it
//! strictly above the threshold resolves it. Alerts are keyed by the movement that
//! raised them, so replaying the log yields the same alert ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{AlertId, Entity, MovementId};

use crate::movement::StockMovement;
use crate::product::Sku;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdStatus {
    #[default]
    Ok,
    Alerted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdTransition {
    Raised,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThresholdTracker {
    status: ThresholdStatus,
}

impl ThresholdTracker {
    pub fn status(&self) -> ThresholdStatus {
        self.status
    }

    /// Feed the quantity after a committed movement; returns the transition taken, if any.
    pub fn evaluate(&mut self, quantity: i64, threshold: i64) -> Option<ThresholdTransition> {
        match self.status {
            ThresholdStatus::Ok if quantity <= threshold => {
                self.status = ThresholdStatus::Alerted;
                Some(ThresholdTransition::Raised)
            }
            ThresholdStatus::Alerted if quantity > threshold => {
                self.status = ThresholdStatus::Ok;
                Some(ThresholdTransition::Resolved)
            }
            _ => None,
        }
    }
}

/// A low-stock alert record. Resolution fills in the `resolved_*` fields; the record
/// itself is never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub sku: Sku,
    /// Threshold in force when the alert was raised.
    pub threshold: i64,
    pub quantity_at_trigger: i64,
    pub triggered_at: DateTime<Utc>,
    pub triggered_by: MovementId,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<MovementId>,
}

impl Alert {
    pub fn raise(threshold: i64, movement: &StockMovement) -> Self {
        Self {
            id: AlertId::from_uuid(*movement.id.as_uuid()),
            sku: movement.sku.clone(),
            threshold,
            quantity_at_trigger: movement.resulting.quantity,
            triggered_at: movement.recorded_at,
            triggered_by: movement.id,
            resolved_at: None,
            resolved_by: None,
        }
    }

    pub fn resolve(&mut self, movement: &StockMovement) {
        self.resolved_at = Some(movement.recorded_at);
        self.resolved_by = Some(movement.id);
    }

    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

impl Entity for Alert {
    type Id = AlertId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
