use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_events::{Event, EventEnvelope};
use stockledger_inventory::{Alert, StockMovement};

/// Stream type of ledger envelopes (stream id = SKU).
pub const SKU_STREAM_TYPE: &str = "inventory.sku";

/// Facts published on the event bus after a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    MovementRecorded(StockMovement),
    AlertRaised(Alert),
    AlertResolved(Alert),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::MovementRecorded(m) => m.event_type(),
            LedgerEvent::AlertRaised(_) => "inventory.alert.raised",
            LedgerEvent::AlertResolved(_) => "inventory.alert.resolved",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::MovementRecorded(m) => m.recorded_at,
            LedgerEvent::AlertRaised(a) => a.triggered_at,
            LedgerEvent::AlertResolved(a) => a.resolved_at.unwrap_or(a.triggered_at),
        }
    }

    fn stream_id(&self) -> String {
        match self {
            LedgerEvent::MovementRecorded(m) => m.stream_id(),
            LedgerEvent::AlertRaised(a) | LedgerEvent::AlertResolved(a) => a.sku.to_string(),
        }
    }
}

impl LedgerEvent {
    /// Wrap for publication on the SKU stream at the movement's sequence.
    pub fn into_envelope(self, sequence: u64) -> EventEnvelope<LedgerEvent> {
        let event_id = match &self {
            LedgerEvent::MovementRecorded(m) => *m.id.as_uuid(),
            LedgerEvent::AlertRaised(_) | LedgerEvent::AlertResolved(_) => Uuid::now_v7(),
        };
        EventEnvelope::new(event_id, self.stream_id(), SKU_STREAM_TYPE, sequence, self)
    }
}
