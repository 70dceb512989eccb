use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use stockledger_inventory::{Sku, StockMovement};

use super::error::LedgerError;

/// How long a request waits for a concurrent request carrying the same key.
pub(crate) const PENDING_KEY_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug)]
enum Slot {
    Pending,
    Done(StockMovement),
}

/// Idempotency keys of committed movements (rebuilt from the log on open).
#[derive(Debug, Default)]
pub(crate) struct IdempotencyCache {
    slots: Mutex<HashMap<String, Slot>>,
    settled: Condvar,
}

pub(crate) enum Reservation<'a> {
    /// The key was already committed; here is the original movement.
    Replay(StockMovement),
    /// The caller owns the key until it completes or drops the guard.
    Owner(KeyGuard<'a>),
}

/// Releases a pending key on drop unless the commit completed.
pub(crate) struct KeyGuard<'a> {
    cache: &'a IdempotencyCache,
    key: String,
    completed: bool,
}

impl KeyGuard<'_> {
    pub(crate) fn complete(mut self, movement: &StockMovement) {
        self.cache.settle(&self.key, Some(movement.clone()));
        self.completed = true;
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.cache.settle(&self.key, None);
        }
    }
}

impl IdempotencyCache {
    pub(crate) fn reserve(&self, key: &str, sku: &Sku) -> Result<Reservation<'_>, LedgerError> {
        let deadline = Instant::now() + PENDING_KEY_WAIT;
        let mut slots = self.slots.lock().map_err(|_| LedgerError::Poisoned)?;

        loop {
            match slots.get(key) {
                Some(Slot::Done(movement)) => return Ok(Reservation::Replay(movement.clone())),
                Some(Slot::Pending) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(LedgerError::Contention {
                            sku: sku.clone(),
                            attempts: 0,
                        });
                    }
                    let (guard, _) = self
                        .settled
                        .wait_timeout(slots, deadline - now)
                        .map_err(|_| LedgerError::Poisoned)?;
                    slots = guard;
                }
                None => {
                    slots.insert(key.to_string(), Slot::Pending);
                    return Ok(Reservation::Owner(KeyGuard {
                        cache: self,
                        key: key.to_string(),
                        completed: false,
                    }));
                }
            }
        }
    }

    /// Register a movement loaded from the log.
    pub(crate) fn record(&self, movement: &StockMovement) -> Result<(), LedgerError> {
        if let Some(key) = &movement.idempotency_key {
            let mut slots = self.slots.lock().map_err(|_| LedgerError::Poisoned)?;
            slots.insert(key.clone(), Slot::Done(movement.clone()));
        }
        Ok(())
    }

    pub(crate) fn clear(&self) -> Result<(), LedgerError> {
        let mut slots = self.slots.lock().map_err(|_| LedgerError::Poisoned)?;
        slots.retain(|_, slot| matches!(slot, Slot::Pending));
        Ok(())
    }

    fn settle(&self, key: &str, movement: Option<StockMovement>) {
        if let Ok(mut slots) = self.slots.lock() {
            match movement {
                Some(m) => {
                    slots.insert(key.to_string(), Slot::Done(m));
                }
                None => {
                    slots.remove(key);
                }
            }
        }
        self.settled.notify_all();
    }
}
