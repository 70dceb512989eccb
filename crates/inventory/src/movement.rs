use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, MovementId};
use stockledger_events::Event;

use crate::product::Sku;

/// Largest quantity a single movement may carry.
pub const MAX_MOVEMENT_QUANTITY: i64 = 1_000_000_000_000;

/// Largest unit cost a movement may carry (whole currency units).
pub const MAX_UNIT_COST: i64 = 1_000_000_000_000;

/// Movement kind. The sign of the quantity delta is implied by the kind (and, for
/// adjustments, by the direction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    In,
    Out,
    Adjustment,
}

impl MovementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::In => "in",
            MovementKind::Out => "out",
            MovementKind::Adjustment => "adjustment",
        }
    }
}

impl core::str::FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in" => Ok(MovementKind::In),
            "out" => Ok(MovementKind::Out),
            "adjustment" => Ok(MovementKind::Adjustment),
            other => Err(DomainError::validation(format!("unknown movement kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    Increase,
    Decrease,
}

/// Command: record one stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub sku: Sku,
    pub kind: MovementKind,
    /// Required for adjustments, rejected otherwise.
    #[serde(default)]
    pub direction: Option<AdjustmentDirection>,
    /// Strictly positive magnitude.
    pub quantity: i64,
    /// Required (and positive) for IN; optional for an upward adjustment; ignored
    /// for issues.
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
    pub actor: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl RecordMovement {
    pub fn inbound(sku: Sku, quantity: i64, unit_cost: Decimal, actor: impl Into<String>) -> Self {
        Self {
            sku,
            kind: MovementKind::In,
            direction: None,
            quantity,
            unit_cost: Some(unit_cost),
            actor: actor.into(),
            reference: None,
            idempotency_key: None,
        }
    }

    pub fn outbound(sku: Sku, quantity: i64, actor: impl Into<String>) -> Self {
        Self {
            sku,
            kind: MovementKind::Out,
            direction: None,
            quantity,
            unit_cost: None,
            actor: actor.into(),
            reference: None,
            idempotency_key: None,
        }
    }

    pub fn adjustment(
        sku: Sku,
        direction: AdjustmentDirection,
        quantity: i64,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            sku,
            kind: MovementKind::Adjustment,
            direction: Some(direction),
            quantity,
            unit_cost: None,
            actor: actor.into(),
            reference: None,
            idempotency_key: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    /// Signed quantity delta implied by kind, direction and magnitude.
    pub fn signed_delta(&self) -> DomainResult<i64> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.quantity > MAX_MOVEMENT_QUANTITY {
            return Err(DomainError::validation(format!(
                "quantity cannot exceed {MAX_MOVEMENT_QUANTITY}"
            )));
        }

        match (self.kind, self.direction) {
            (MovementKind::In, None) => Ok(self.quantity),
            (MovementKind::Out, None) => Ok(-self.quantity),
            (MovementKind::Adjustment, Some(AdjustmentDirection::Increase)) => Ok(self.quantity),
            (MovementKind::Adjustment, Some(AdjustmentDirection::Decrease)) => Ok(-self.quantity),
            (MovementKind::Adjustment, None) => {
                Err(DomainError::validation("adjustment requires a direction"))
            }
            (_, Some(_)) => Err(DomainError::validation(
                "direction is only valid for adjustments",
            )),
        }
    }

    /// Validate everything except the quantity (cost, actor, optional fields).
    pub fn validate_details(&self) -> DomainResult<()> {
        self.validate_unit_cost()?;
        self.validate_metadata()
    }

    /// Cost rules: required and positive for IN, non-negative when given for an
    /// adjustment, at most `MAX_UNIT_COST` for both, ignored otherwise.
    pub fn validate_unit_cost(&self) -> DomainResult<()> {
        match (self.kind, self.unit_cost) {
            (MovementKind::In, None) => {
                return Err(DomainError::validation("unit cost is required for IN movements"));
            }
            (MovementKind::In, Some(cost)) if cost <= Decimal::ZERO => {
                return Err(DomainError::validation("unit cost must be positive"));
            }
            (MovementKind::Adjustment, Some(cost)) if cost < Decimal::ZERO => {
                return Err(DomainError::validation("unit cost cannot be negative"));
            }
            (MovementKind::In | MovementKind::Adjustment, Some(cost))
                if cost > Decimal::from(MAX_UNIT_COST) =>
            {
                return Err(DomainError::validation(format!(
                    "unit cost cannot exceed {MAX_UNIT_COST}"
                )));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn validate_metadata(&self) -> DomainResult<()> {
        if self.actor.trim().is_empty() {
            return Err(DomainError::validation("actor cannot be empty"));
        }

        if let Some(key) = &self.idempotency_key {
            if key.trim().is_empty() {
                return Err(DomainError::validation("idempotency key cannot be blank"));
            }
        }

        Ok(())
    }
}

/// Position of a SKU right after a movement was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub valuation: Decimal,
}

/// Event: a committed stock movement (immutable fact).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub sku: Sku,
    pub kind: MovementKind,
    #[serde(default)]
    pub direction: Option<AdjustmentDirection>,
    /// Logical timestamp: strictly increasing per SKU, starting at 1.
    pub sequence: u64,
    /// Global commit order assigned by the movement log at append.
    pub commit_position: u64,
    pub delta: i64,
    /// Incoming cost for receipts, realized cost for issues.
    pub unit_cost: Decimal,
    /// Value moved in or out by this movement (`|delta| × unit_cost`).
    pub total_cost: Decimal,
    pub actor: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub resulting: PositionSnapshot,
    /// Reorder threshold of the product when the movement was committed. Replays
    /// evaluate low-stock alerts against it, not against the current catalog.
    #[serde(default)]
    pub reorder_threshold: Option<i64>,
}

impl StockMovement {
    pub fn quantity(&self) -> i64 {
        self.delta.abs()
    }

    pub fn is_increase(&self) -> bool {
        self.delta > 0
    }
}

impl Event for StockMovement {
    fn event_type(&self) -> &'static str {
        "inventory.movement.recorded"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    fn stream_id(&self) -> String {
        self.sku.to_string()
    }
}
