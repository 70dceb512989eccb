use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use stockledger_core::ExpectedVersion;
use stockledger_inventory::{Sku, StockMovement};

use super::r#trait::{MovementStore, MovementStoreError};

#[derive(Debug, Default)]
struct LogState {
    /// Every movement in commit order; index `i` holds commit position `i + 1`.
    log: Vec<StockMovement>,
    /// Per-SKU indices into `log`.
    streams: HashMap<Sku, Vec<usize>>,
}

impl LogState {
    fn current_version(&self, sku: &Sku) -> u64 {
        self.streams
            .get(sku)
            .and_then(|idx| idx.last())
            .map(|&i| self.log[i].sequence)
            .unwrap_or(0)
    }

    fn prepare(
        &self,
        mut movement: StockMovement,
        expected_version: ExpectedVersion,
    ) -> Result<StockMovement, MovementStoreError> {
        let current = self.current_version(&movement.sku);

        if !expected_version.matches(current) {
            return Err(MovementStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current} for {}",
                movement.sku
            )));
        }

        if movement.sequence != current + 1 {
            return Err(MovementStoreError::InvalidAppend(format!(
                "sequence {} does not follow stream version {current} for {}",
                movement.sequence, movement.sku
            )));
        }

        movement.commit_position = self.log.len() as u64 + 1;
        Ok(movement)
    }

    fn push(&mut self, movement: StockMovement) {
        let idx = self.log.len();
        self.streams.entry(movement.sku.clone()).or_default().push(idx);
        self.log.push(movement);
    }
}

/// In-memory append-only movement log.
///
/// Intended for tests/dev; also the index behind the journal store.
#[derive(Debug, Default)]
pub struct InMemoryMovementStore {
    /// Serializes appends; only holders of this lock mutate `state`.
    appends: Mutex<()>,
    state: RwLock<LogState>,
}

impl InMemoryMovementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append, running `persist` on the positioned movement before it becomes visible.
    ///
    /// Appends are serialized, so persistence order equals commit order. Readers are
    /// only excluded for the final push, never while `persist` runs.
    pub(crate) fn append_with<F>(
        &self,
        movement: StockMovement,
        expected_version: ExpectedVersion,
        persist: F,
    ) -> Result<StockMovement, MovementStoreError>
    where
        F: FnOnce(&StockMovement) -> Result<(), MovementStoreError>,
    {
        let _append = self.appends.lock().map_err(|_| MovementStoreError::Poisoned)?;
        let stored = self
            .state
            .read()
            .map_err(|_| MovementStoreError::Poisoned)?
            .prepare(movement, expected_version)?;

        persist(&stored)?;

        self.state
            .write()
            .map_err(|_| MovementStoreError::Poisoned)?
            .push(stored.clone());
        Ok(stored)
    }

    /// Re-insert a movement that was already positioned (loading a journal).
    pub(crate) fn restore(&self, movement: StockMovement) -> Result<(), MovementStoreError> {
        let _append = self.appends.lock().map_err(|_| MovementStoreError::Poisoned)?;
        let mut state = self.state.write().map_err(|_| MovementStoreError::Poisoned)?;
        let expected_position = movement.commit_position;
        let sequence = movement.sequence;
        let prepared = state.prepare(movement, ExpectedVersion::Exact(sequence.saturating_sub(1)))?;

        if prepared.commit_position != expected_position {
            return Err(MovementStoreError::InvalidAppend(format!(
                "commit position gap (expected {}, found {expected_position})",
                prepared.commit_position
            )));
        }

        state.push(prepared);
        Ok(())
    }
}

impl MovementStore for InMemoryMovementStore {
    fn append(
        &self,
        movement: StockMovement,
        expected_version: ExpectedVersion,
    ) -> Result<StockMovement, MovementStoreError> {
        self.append_with(movement, expected_version, |_| Ok(()))
    }

    fn load_stream(&self, sku: &Sku) -> Result<Vec<StockMovement>, MovementStoreError> {
        let state = self.state.read().map_err(|_| MovementStoreError::Poisoned)?;

        Ok(state
            .streams
            .get(sku)
            .map(|idx| idx.iter().map(|&i| state.log[i].clone()).collect())
            .unwrap_or_default())
    }

    fn read_from(
        &self,
        after_position: u64,
        limit: usize,
    ) -> Result<Vec<StockMovement>, MovementStoreError> {
        let state = self.state.read().map_err(|_| MovementStoreError::Poisoned)?;
        let start = usize::try_from(after_position).unwrap_or(usize::MAX);

        Ok(state
            .log
            .iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect())
    }

    fn head_position(&self) -> Result<u64, MovementStoreError> {
        let state = self.state.read().map_err(|_| MovementStoreError::Poisoned)?;
        Ok(state.log.len() as u64)
    }
}
