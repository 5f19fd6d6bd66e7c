//! admitflow-core: in-memory admission filter that turns unordered,
//! duplicate-laden event batches into a strictly time-ordered,
//! exactly-once sequence under a monotonic watermark.
//!
//! Pure library: no I/O, no async, no global state.

pub mod buffer;
pub mod shared;
pub mod types;

pub use buffer::{AdmissionBuffer, AdmissionReport, RejectReason, Rejection};
pub use shared::SharedAdmissionBuffer;
pub use types::{AdmissionError, Event, EventId, TimedEvent};
