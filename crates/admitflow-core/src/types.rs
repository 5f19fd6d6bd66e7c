use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Borrow;
use std::fmt;

// ─── Identity ─────────────────────────────────────────────────────

/// Opaque token naming one logical occurrence of an event.
///
/// Ordering is byte-wise over the underlying UTF-8, which is the tie-break
/// used when two candidates share a timestamp.
#[derive(
    Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty token cannot name an occurrence and is rejected at admission.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for EventId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ─── Event ────────────────────────────────────────────────────────

/// Immutable candidate for admission. The buffer compares `id` and
/// `timestamp` and never looks at `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event<T, P> {
    /// Absent or `null` on the wire decodes to an empty id, so the batch is
    /// refused by admission validation rather than by the decoder.
    #[serde(default, deserialize_with = "id_or_empty")]
    pub id: EventId,
    pub timestamp: T,
    #[serde(default)]
    pub payload: P,
}

impl<T, P> Event<T, P> {
    pub fn new(id: impl Into<EventId>, timestamp: T, payload: P) -> Self {
        Self {
            id: id.into(),
            timestamp,
            payload,
        }
    }
}

fn id_or_empty<'de, D>(deserializer: D) -> Result<EventId, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|id| EventId(id.unwrap_or_default()))
}

/// Wall-clock event carrying a JSON payload, as exchanged by the runtime.
pub type TimedEvent = Event<DateTime<Utc>, serde_json::Value>;

// ─── Errors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// The batch is missing or contains an event without a usable identity.
    /// Raised before any state is touched.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
