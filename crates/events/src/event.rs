use chrono::{DateTime, Utc};

/// A fact published after a commit. Never mutated once built.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name, e.g. `inventory.movement.recorded`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version.
    fn version(&self) -> u32;

    /// Business time of the fact (commit time for movements).
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Stream the event belongs to; ledger streams are keyed by SKU.
    fn stream_id(&self) -> String;
}
