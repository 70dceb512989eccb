use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_infra::audit::AuditFilter;
use stockledger_infra::projections::AlertStatus;
use stockledger_inventory::{
    AdjustmentDirection, BackorderPolicy, CostLayer, CostingMethod, InventoryPosition,
    MovementKind, Product, RecordMovement, Sku,
};

use crate::app::errors;

type Rejection = axum::response::Response;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /movements`. Kind, direction and quantity are parsed by hand so a bad
/// value is reported as `invalid_quantity` instead of a generic body rejection.
#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub sku: String,
    pub kind: String,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub quantity: serde_json::Value,
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
    pub actor: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl MovementRequest {
    /// `header_key` (the `Idempotency-Key` header) is used when the body carries none.
    pub fn into_command(self, header_key: Option<String>) -> Result<RecordMovement, Rejection> {
        let sku = errors::parse_sku(&self.sku)?;
        let kind: MovementKind = self
            .kind
            .parse()
            .map_err(|e: stockledger_core::DomainError| invalid_quantity(e.to_string()))?;
        let direction = self.direction.as_deref().map(parse_direction).transpose()?;
        let quantity = parse_quantity(&self.quantity)?;

        Ok(RecordMovement {
            sku,
            kind,
            direction,
            quantity,
            unit_cost: self.unit_cost,
            actor: self.actor,
            reference: self.reference,
            idempotency_key: self.idempotency_key.or(header_key),
        })
    }
}

/// Whole numbers only: strings, fractions, null and values past `i64` are rejected.
fn parse_quantity(raw: &serde_json::Value) -> Result<i64, Rejection> {
    raw.as_i64()
        .ok_or_else(|| invalid_quantity(format!("quantity must be a whole number, got {raw}")))
}

fn parse_direction(raw: &str) -> Result<AdjustmentDirection, Rejection> {
    match raw.to_ascii_lowercase().as_str() {
        "increase" | "up" => Ok(AdjustmentDirection::Increase),
        "decrease" | "down" => Ok(AdjustmentDirection::Decrease),
        other => Err(invalid_quantity(format!(
            "direction must be increase or decrease, got '{other}'"
        ))),
    }
}

fn invalid_quantity(message: String) -> Rejection {
    errors::json_error(StatusCode::BAD_REQUEST, "invalid_quantity", message)
}

/// Body of `PUT /products/{sku}`.
#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit_of_measure: Option<String>,
    #[serde(default)]
    pub reorder_threshold: i64,
    #[serde(default)]
    pub backorder: BackorderPolicy,
}

impl ProductRequest {
    pub fn into_product(self, sku: Sku) -> Product {
        Product {
            sku,
            name: self.name,
            category: self.category,
            unit_of_measure: self.unit_of_measure,
            reorder_threshold: self.reorder_threshold,
            backorder: self.backorder,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertsParams {
    pub status: Option<AlertStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(default)]
    pub repair: bool,
}

/// Query string of `GET /audit`.
#[derive(Debug, Default, Deserialize)]
pub struct AuditParams {
    pub sku: Option<String>,
    pub actor: Option<String>,
    pub kind: Option<String>,
    /// Inclusive lower bound (RFC 3339).
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound (RFC 3339).
    pub until: Option<DateTime<Utc>>,
    pub token: Option<String>,
    pub limit: Option<u32>,
}

impl AuditParams {
    pub fn filter(&self) -> Result<AuditFilter, Rejection> {
        let sku = self.sku.as_deref().map(errors::parse_sku).transpose()?;
        let kind = match self.kind.as_deref() {
            Some(raw) => Some(raw.parse::<MovementKind>().map_err(|e| {
                errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
            })?),
            None => None,
        };
        if let (Some(from), Some(until)) = (self.from, self.until) {
            if from >= until {
                return Err(errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    "`from` must be earlier than `until`",
                ));
            }
        }

        Ok(AuditFilter {
            sku,
            actor: self.actor.clone(),
            kind,
            from: self.from,
            until: self.until,
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SkuValuation {
    pub sku: Sku,
    pub method: CostingMethod,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub valuation: Decimal,
    /// Remaining FIFO layers, oldest first; empty under weighted average.
    pub layers: Vec<CostLayer>,
}

impl SkuValuation {
    pub fn new(method: CostingMethod, position: InventoryPosition, layers: Vec<CostLayer>) -> Self {
        Self {
            sku: position.sku,
            method,
            quantity: position.quantity,
            unit_cost: position.unit_cost,
            valuation: position.valuation,
            layers,
        }
    }
}
