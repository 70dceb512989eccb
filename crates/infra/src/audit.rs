//! Audit queries over the movement log.
//!
//! Read-only: queries never mutate the log. Results follow global commit order and
//! can be consumed lazily (`AuditQuery` is an iterator that reads the log in batches)
//! or page by page with a continuation token naming the last returned movement.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_core::MovementId;
use stockledger_inventory::{
    AdjustmentDirection, MovementKind, PositionSnapshot, Sku, StockMovement,
};

use crate::movement_log::{MovementStore, MovementStoreError};

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Movements read from the log per batch while scanning.
const SCAN_BATCH: usize = 256;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("invalid continuation token: {0}")]
    InvalidToken(String),

    #[error(transparent)]
    Store(#[from] MovementStoreError),
}

/// Audit filter. Every field is optional; set fields are AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub sku: Option<Sku>,
    pub actor: Option<String>,
    pub kind: Option<MovementKind>,
    /// Inclusive lower bound on `recorded_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `recorded_at`.
    pub until: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn for_sku(sku: Sku) -> Self {
        Self {
            sku: Some(sku),
            ..Self::default()
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_kind(mut self, kind: MovementKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.until = until;
        self
    }

    pub fn matches(&self, movement: &StockMovement) -> bool {
        self.sku.as_ref().is_none_or(|s| *s == movement.sku)
            && self.actor.as_ref().is_none_or(|a| *a == movement.actor)
            && self.kind.is_none_or(|k| k == movement.kind)
            && self.from.is_none_or(|from| movement.recorded_at >= from)
            && self.until.is_none_or(|until| movement.recorded_at < until)
    }
}

/// Read-only view of one committed movement and the position it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub movement_id: MovementId,
    pub sku: Sku,
    pub kind: MovementKind,
    pub direction: Option<AdjustmentDirection>,
    pub sequence: u64,
    pub commit_position: u64,
    pub quantity: i64,
    pub delta: i64,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub actor: String,
    pub reference: Option<String>,
    pub idempotency_key: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub resulting: PositionSnapshot,
    pub reorder_threshold: Option<i64>,
}

impl From<StockMovement> for AuditEntry {
    fn from(m: StockMovement) -> Self {
        Self {
            movement_id: m.id,
            quantity: m.quantity(),
            sku: m.sku,
            kind: m.kind,
            direction: m.direction,
            sequence: m.sequence,
            commit_position: m.commit_position,
            delta: m.delta,
            unit_cost: m.unit_cost,
            total_cost: m.total_cost,
            actor: m.actor,
            reference: m.reference,
            idempotency_key: m.idempotency_key,
            recorded_at: m.recorded_at,
            resulting: m.resulting,
            reorder_threshold: m.reorder_threshold,
        }
    }
}

/// Position of the last returned entry: `"{commit_position}:{movement_id}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationToken {
    pub position: u64,
    pub movement_id: MovementId,
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.position, self.movement_id)
    }
}

impl FromStr for ContinuationToken {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (position, id) = s
            .split_once(':')
            .ok_or_else(|| AuditError::InvalidToken("expected '<position>:<movement id>'".into()))?;
        let position = position
            .parse::<u64>()
            .map_err(|e| AuditError::InvalidToken(format!("position: {e}")))?;
        let movement_id = id
            .parse::<MovementId>()
            .map_err(|e| AuditError::InvalidToken(e.to_string()))?;
        Ok(Self {
            position,
            movement_id,
        })
    }
}

impl Serialize for ContinuationToken {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContinuationToken {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub next_token: Option<ContinuationToken>,
}

/// Clamp a requested page size (default 50, capped at 1000).
pub fn page_limit(limit: Option<u32>) -> usize {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT) as usize
}

/// Lazy, restartable scan of the log in commit order.
pub struct AuditQuery<'a, S: ?Sized> {
    store: &'a S,
    filter: AuditFilter,
    after: u64,
    buffer: VecDeque<StockMovement>,
    exhausted: bool,
}

impl<'a, S> AuditQuery<'a, S>
where
    S: MovementStore + ?Sized,
{
    pub fn new(store: &'a S, filter: AuditFilter) -> Self {
        Self::resume(store, filter, 0)
    }

    /// Continue after commit position `after` (0 starts from the beginning).
    pub fn resume(store: &'a S, filter: AuditFilter, after: u64) -> Self {
        Self {
            store,
            filter,
            after,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Continue after a token, checking that it names a movement in the log.
    pub fn from_token(
        store: &'a S,
        filter: AuditFilter,
        token: &ContinuationToken,
    ) -> Result<Self, AuditError> {
        if token.position == 0 {
            return Err(AuditError::InvalidToken("position must be positive".into()));
        }
        let found = store.read_from(token.position - 1, 1)?;
        match found.first() {
            Some(m) if m.id == token.movement_id => Ok(Self::resume(store, filter, token.position)),
            _ => Err(AuditError::InvalidToken(format!(
                "no movement {} at position {}",
                token.movement_id, token.position
            ))),
        }
    }

    /// Collect up to `limit` entries and a token for the next page, if any.
    pub fn page(mut self, limit: usize) -> Result<AuditPage, AuditError> {
        let mut entries = Vec::with_capacity(limit.min(SCAN_BATCH));

        while entries.len() < limit {
            match self.next() {
                Some(entry) => entries.push(entry?),
                None => break,
            }
        }

        let next_token = match (entries.last(), self.next()) {
            (Some(last), Some(Ok(_))) => Some(ContinuationToken {
                position: last.commit_position,
                movement_id: last.movement_id,
            }),
            (_, Some(Err(e))) => return Err(e.into()),
            _ => None,
        };

        Ok(AuditPage {
            entries,
            next_token,
        })
    }
}

impl<S> Iterator for AuditQuery<'_, S>
where
    S: MovementStore + ?Sized,
{
    type Item = Result<AuditEntry, MovementStoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            while let Some(movement) = self.buffer.pop_front() {
                if self.filter.matches(&movement) {
                    return Some(Ok(movement.into()));
                }
            }

            if self.exhausted {
                return None;
            }

            match self.store.read_from(self.after, SCAN_BATCH) {
                Ok(batch) => {
                    if batch.len() < SCAN_BATCH {
                        self.exhausted = true;
                    }
                    if let Some(last) = batch.last() {
                        self.after = last.commit_position;
                    }
                    self.buffer.extend(batch);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement_log::InMemoryMovementStore;
    use crate::movement_log::in_memory::tests::movement;
    use stockledger_core::ExpectedVersion;

    fn seeded(n: u64) -> InMemoryMovementStore {
        let store = InMemoryMovementStore::new();
        for seq in 1..=n {
            let sku = if seq % 2 == 0 { "EVEN" } else { "ODD" };
            let mut m = movement(sku, seq.div_ceil(2), 1);
            m.actor = if seq % 3 == 0 { "bob" } else { "alice" }.to_string();
            let version = m.sequence - 1;
            store.append(m, ExpectedVersion::Exact(version)).unwrap();
        }
        store
    }

    #[test]
    fn pages_cover_the_filtered_log_in_commit_order() {
        let store = seeded(600);
        let filter = AuditFilter::for_sku(Sku::parse("EVEN").unwrap());

        let mut positions = Vec::new();
        let mut page = AuditQuery::new(&store, filter.clone()).page(120).unwrap();
        loop {
            positions.extend(page.entries.iter().map(|e| e.commit_position));
            let Some(token) = page.next_token else { break };
            page = AuditQuery::from_token(&store, filter.clone(), &token)
                .unwrap()
                .page(120)
                .unwrap();
        }

        assert_eq!(positions.len(), 300);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(positions.iter().all(|p| p % 2 == 0));
    }

    #[test]
    fn last_page_has_no_token() {
        let store = seeded(4);
        let page = AuditQuery::new(&store, AuditFilter::default()).page(4).unwrap();
        assert_eq!(page.entries.len(), 4);
        assert!(page.next_token.is_none());
    }

    #[test]
    fn actor_and_kind_filters_combine() {
        let store = seeded(9);
        let entries: Vec<_> = AuditQuery::new(
            &store,
            AuditFilter::default()
                .with_actor("bob")
                .with_kind(MovementKind::In),
        )
        .collect::<Result<_, _>>()
        .unwrap();
        assert_eq!(
            entries.iter().map(|e| e.commit_position).collect::<Vec<_>>(),
            vec![3, 6, 9]
        );
    }

    #[test]
    fn time_range_is_half_open() {
        let store = InMemoryMovementStore::new();
        let start = Utc::now();
        for seq in 1..=4u64 {
            let mut m = movement("A", seq, 1);
            m.recorded_at = start + chrono::Duration::seconds(seq as i64);
            store.append(m, ExpectedVersion::Exact(seq - 1)).unwrap();
        }

        let filter = AuditFilter::default().between(
            Some(start + chrono::Duration::seconds(2)),
            Some(start + chrono::Duration::seconds(4)),
        );
        let entries: Vec<_> = AuditQuery::new(&store, filter)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(
            entries.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[test]
    fn forged_token_is_rejected() {
        let store = seeded(3);
        let token = ContinuationToken {
            position: 2,
            movement_id: MovementId::new(),
        };
        let err = AuditQuery::from_token(&store, AuditFilter::default(), &token)
            .err()
            .unwrap();
        assert!(matches!(err, AuditError::InvalidToken(_)));

        assert!("12".parse::<ContinuationToken>().is_err());
        assert!("x:y".parse::<ContinuationToken>().is_err());
    }

    #[test]
    fn token_round_trips_through_text() {
        let token = ContinuationToken {
            position: 42,
            movement_id: MovementId::new(),
        };
        assert_eq!(token.to_string().parse::<ContinuationToken>().unwrap(), token);
    }
}
