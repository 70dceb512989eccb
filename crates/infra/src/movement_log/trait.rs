use std::sync::Arc;

use thiserror::Error;

use stockledger_core::ExpectedVersion;
use stockledger_inventory::{Sku, StockMovement};

/// Movement log operation error.
///
/// These are **infrastructure errors** (storage, concurrency, corruption) as opposed
/// to domain errors (validation, stock rule).
#[derive(Debug, Error)]
pub enum MovementStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("journal io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt journal at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    #[error("movement log lock poisoned")]
    Poisoned,
}

/// Append-only log of committed stock movements (the source of truth).
///
/// Movements are organized into one stream per SKU. Within a stream, movements carry
/// contiguous sequence numbers (1, 2, 3, ...); the stream version is the last sequence.
/// Across streams, every movement gets a global `commit_position` assigned at append,
/// which defines the total commit order used by audit queries and replay.
///
/// Implementations must:
/// - enforce optimistic concurrency against the current stream version
/// - reject a movement whose sequence is not `current_version + 1`
/// - assign `commit_position`s monotonically (no gaps, no duplicates)
/// - make a movement durable before returning it (the single atomic boundary)
pub trait MovementStore: Send + Sync {
    /// Append one movement to its SKU stream and return it with its commit position.
    fn append(
        &self,
        movement: StockMovement,
        expected_version: ExpectedVersion,
    ) -> Result<StockMovement, MovementStoreError>;

    /// Load the full stream for one SKU, in sequence order.
    fn load_stream(&self, sku: &Sku) -> Result<Vec<StockMovement>, MovementStoreError>;

    /// Read up to `limit` movements with a commit position strictly greater than
    /// `after_position`, in commit order.
    fn read_from(
        &self,
        after_position: u64,
        limit: usize,
    ) -> Result<Vec<StockMovement>, MovementStoreError>;

    /// Commit position of the last appended movement (0 when empty).
    fn head_position(&self) -> Result<u64, MovementStoreError>;

    /// Load the entire log in commit order.
    fn load_all(&self) -> Result<Vec<StockMovement>, MovementStoreError> {
        let head = self.head_position()?;
        let limit = usize::try_from(head).unwrap_or(usize::MAX);
        self.read_from(0, limit)
    }
}

impl<S> MovementStore for Arc<S>
where
    S: MovementStore + ?Sized,
{
    fn append(
        &self,
        movement: StockMovement,
        expected_version: ExpectedVersion,
    ) -> Result<StockMovement, MovementStoreError> {
        (**self).append(movement, expected_version)
    }

    fn load_stream(&self, sku: &Sku) -> Result<Vec<StockMovement>, MovementStoreError> {
        (**self).load_stream(sku)
    }

    fn read_from(
        &self,
        after_position: u64,
        limit: usize,
    ) -> Result<Vec<StockMovement>, MovementStoreError> {
        (**self).read_from(after_position, limit)
    }

    fn head_position(&self) -> Result<u64, MovementStoreError> {
        (**self).head_position()
    }

    fn load_all(&self) -> Result<Vec<StockMovement>, MovementStoreError> {
        (**self).load_all()
    }
}
