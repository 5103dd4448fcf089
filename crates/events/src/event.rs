use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are:
/// - facts about committed changes, never edited
/// - versioned per event type
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "order.placed").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
