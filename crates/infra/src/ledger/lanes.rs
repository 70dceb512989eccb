//! Per-SKU commit lanes.
//!
//! Every SKU gets one lane: a version counter (the last committed sequence) behind a
//! mutex. Writers decide a movement against an unlocked snapshot, then take the lane
//! guard and commit only if the version is unchanged. Readers take the same guard, so
//! they never observe a half-applied movement. Different SKUs never share a lane.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use stockledger_inventory::Sku;

use super::error::LedgerError;

#[derive(Debug)]
pub(crate) struct Lane {
    version: Mutex<u64>,
}

impl Lane {
    fn new(version: u64) -> Self {
        Self {
            version: Mutex::new(version),
        }
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, u64>, LedgerError> {
        self.version.lock().map_err(|_| LedgerError::Poisoned)
    }

    pub(crate) fn version(&self) -> Result<u64, LedgerError> {
        Ok(*self.lock()?)
    }
}

#[derive(Debug, Default)]
pub(crate) struct LaneArena {
    lanes: RwLock<HashMap<Sku, Arc<Lane>>>,
}

impl LaneArena {
    /// Lane for `sku`, created at `initial_version` on first use.
    pub(crate) fn lane(
        &self,
        sku: &Sku,
        initial_version: impl FnOnce() -> Result<u64, LedgerError>,
    ) -> Result<Arc<Lane>, LedgerError> {
        {
            let lanes = self.lanes.read().map_err(|_| LedgerError::Poisoned)?;
            if let Some(lane) = lanes.get(sku) {
                return Ok(lane.clone());
            }
        }

        let mut lanes = self.lanes.write().map_err(|_| LedgerError::Poisoned)?;
        if let Some(lane) = lanes.get(sku) {
            return Ok(lane.clone());
        }
        let lane = Arc::new(Lane::new(initial_version()?));
        lanes.insert(sku.clone(), lane.clone());
        Ok(lane)
    }

    /// Forget every lane (after a projection rebuild).
    pub(crate) fn reset(&self) -> Result<(), LedgerError> {
        let mut lanes = self.lanes.write().map_err(|_| LedgerError::Poisoned)?;
        lanes.clear();
        Ok(())
    }
}
