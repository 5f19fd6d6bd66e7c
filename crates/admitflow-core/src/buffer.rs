//! Admission buffer: turns unordered, duplicate-laden batches into a
//! strictly time-ordered, exactly-once admitted sequence.
//!
//! The buffer keeps two pieces of state: the watermark (timestamp of the
//! last admitted event) and the set of every identity ever admitted.
//! Neither ever shrinks.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{AdmissionError, Event, EventId};

// ─── Report ──────────────────────────────────────────────────────────

/// Why a well-formed candidate was not admitted. These are business-rule
/// no-ops, not faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason<T> {
    /// Identity was admitted by an earlier call.
    AlreadyAdmitted,
    /// Identity was admitted earlier in this same batch.
    DuplicateInBatch,
    /// Timestamp is at or before the watermark in force when it was reached.
    Outdated { watermark: T },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection<T, P> {
    pub event: Event<T, P>,
    #[serde(flatten)]
    pub reason: RejectReason<T>,
}

/// Full outcome of one admission pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionReport<T, P> {
    /// Admitted events, strictly increasing by timestamp.
    pub admitted: Vec<Event<T, P>>,
    /// Non-admitted candidates, in `(timestamp, id)` order.
    pub rejected: Vec<Rejection<T, P>>,
    pub watermark_before: Option<T>,
    pub watermark_after: Option<T>,
}

impl<T: PartialEq, P> AdmissionReport<T, P> {
    pub fn watermark_advanced(&self) -> bool {
        self.watermark_before != self.watermark_after
    }
}

// ─── AdmissionBuffer ─────────────────────────────────────────────────

/// Exactly-once, watermark-ordered admission filter.
///
/// Not thread-safe: one logical caller at a time. Wrap in
/// [`crate::shared::SharedAdmissionBuffer`] (or any single mutex) when
/// several callers feed the same stream.
#[derive(Debug, Clone)]
pub struct AdmissionBuffer<T> {
    /// `None` until the first admission.
    watermark: Option<T>,
    /// Every identity ever admitted. No eviction.
    admitted: HashSet<EventId>,
}

impl<T> Default for AdmissionBuffer<T> {
    fn default() -> Self {
        Self {
            watermark: None,
            admitted: HashSet::new(),
        }
    }
}

impl<T: Ord + Clone> AdmissionBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest timestamp admitted so far.
    pub fn watermark(&self) -> Option<&T> {
        self.watermark.as_ref()
    }

    pub fn admitted_count(&self) -> usize {
        self.admitted.len()
    }

    pub fn is_admitted(&self, id: &str) -> bool {
        self.admitted.contains(id)
    }

    /// Admit what can be admitted from `batch`, returned in admission
    /// (timestamp-ascending) order.
    ///
    /// Fails with [`AdmissionError::InvalidInput`] if any event has an empty
    /// identity, in which case nothing is admitted and state is unchanged.
    pub fn admit<P>(
        &mut self,
        batch: impl IntoIterator<Item = Event<T, P>>,
    ) -> Result<Vec<Event<T, P>>, AdmissionError> {
        self.admit_with_report(batch).map(|report| report.admitted)
    }

    /// Same decisions as [`Self::admit`], also reporting every rejected
    /// candidate and the watermark movement.
    ///
    /// Candidates are walked in `(timestamp, id)` order. A candidate is
    /// admitted when its identity is new (across calls and within this
    /// batch) and its timestamp is strictly after the working watermark,
    /// which then moves to that timestamp. Among events with equal
    /// timestamp and identity, the earliest in the batch is the one
    /// considered for admission.
    pub fn admit_with_report<P>(
        &mut self,
        batch: impl IntoIterator<Item = Event<T, P>>,
    ) -> Result<AdmissionReport<T, P>, AdmissionError> {
        let mut candidates: Vec<Event<T, P>> = batch.into_iter().collect();

        if let Some(pos) = candidates.iter().position(|e| e.id.is_empty()) {
            tracing::warn!(
                batch_size = candidates.len(),
                position = pos,
                "rejecting batch with empty event identity"
            );
            return Err(AdmissionError::InvalidInput(format!(
                "event at position {pos} has an empty identity"
            )));
        }

        let batch_size = candidates.len();
        // Stable: equal (timestamp, id) keep their batch order.
        candidates.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        let watermark_before = self.watermark.clone();
        let mut working = self.watermark.clone();
        let mut fresh: HashSet<EventId> = HashSet::new();
        let mut admitted = Vec::new();
        let mut rejected = Vec::new();

        for event in candidates {
            let reason = if self.admitted.contains(&event.id) {
                Some(RejectReason::AlreadyAdmitted)
            } else if fresh.contains(&event.id) {
                Some(RejectReason::DuplicateInBatch)
            } else {
                match &working {
                    Some(wm) if event.timestamp <= *wm => Some(RejectReason::Outdated {
                        watermark: wm.clone(),
                    }),
                    _ => None,
                }
            };

            match reason {
                Some(reason) => rejected.push(Rejection { event, reason }),
                None => {
                    working = Some(event.timestamp.clone());
                    fresh.insert(event.id.clone());
                    admitted.push(event);
                }
            }
        }

        // Commit only once the walk is complete.
        let watermark_advanced = working != watermark_before;
        self.admitted.extend(fresh);
        self.watermark = working;

        tracing::debug!(
            batch_size,
            admitted = admitted.len(),
            rejected = rejected.len(),
            total_admitted = self.admitted.len(),
            watermark_advanced,
            "admission pass complete"
        );

        Ok(AdmissionReport {
            admitted,
            rejected,
            watermark_before,
            watermark_after: self.watermark.clone(),
        })
    }
}
