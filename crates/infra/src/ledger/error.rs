use thiserror::Error;

use stockledger_core::DomainError;
use stockledger_inventory::Sku;

use crate::audit::AuditError;
use crate::movement_log::MovementStoreError;
use crate::projections::ProjectionError;
use crate::replay::ReplayError;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The SKU is not registered in the product catalog.
    #[error("unknown product: {0}")]
    UnknownProduct(Sku),

    /// Non-positive or out-of-range quantity, missing/invalid unit cost, missing
    /// adjustment direction.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Any other malformed request (blank actor, blank idempotency key, bad product).
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient stock (available: {available}, requested: {requested})")]
    InsufficientStock { available: i64, requested: i64 },

    /// Optimistic commit retries exhausted (transient).
    #[error("contention on {sku} after {attempts} attempts")]
    Contention { sku: Sku, attempts: u32 },

    #[error("invalid continuation token: {0}")]
    InvalidToken(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("movement log error: {0}")]
    Store(MovementStoreError),

    #[error("projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("ledger lock poisoned")]
    Poisoned,
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => LedgerError::Validation(msg),
            DomainError::InvalidId(msg) => LedgerError::Validation(msg),
            DomainError::InsufficientStock {
                available,
                requested,
            } => LedgerError::InsufficientStock {
                available,
                requested,
            },
            DomainError::InvariantViolation(msg) => LedgerError::Invariant(msg),
        }
    }
}

impl From<MovementStoreError> for LedgerError {
    fn from(value: MovementStoreError) -> Self {
        match value {
            MovementStoreError::Poisoned => LedgerError::Poisoned,
            other => LedgerError::Store(other),
        }
    }
}

impl From<AuditError> for LedgerError {
    fn from(value: AuditError) -> Self {
        match value {
            AuditError::InvalidToken(msg) => LedgerError::InvalidToken(msg),
            AuditError::Store(e) => e.into(),
        }
    }
}

impl From<ReplayError> for LedgerError {
    fn from(value: ReplayError) -> Self {
        match value {
            ReplayError::Store(e) => e.into(),
            ReplayError::Projection(e) => e.into(),
        }
    }
}

impl LedgerError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Contention { .. })
    }
}
