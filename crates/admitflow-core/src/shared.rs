//! Mutex-serialized handle for feeding one buffer from several callers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::buffer::{AdmissionBuffer, AdmissionReport};
use crate::types::{AdmissionError, Event};

/// Cloneable handle to a single [`AdmissionBuffer`]. Every call takes the
/// same lock, so two admission passes never interleave.
#[derive(Debug)]
pub struct SharedAdmissionBuffer<T> {
    inner: Arc<Mutex<AdmissionBuffer<T>>>,
}

impl<T> Clone for SharedAdmissionBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Ord + Clone> Default for SharedAdmissionBuffer<T> {
    fn default() -> Self {
        Self::new(AdmissionBuffer::new())
    }
}

impl<T: Ord + Clone> SharedAdmissionBuffer<T> {
    pub fn new(buffer: AdmissionBuffer<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    // A poisoned lock still holds consistent state: `admit_with_report`
    // writes nothing until its walk has finished.
    fn lock(&self) -> MutexGuard<'_, AdmissionBuffer<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn admit<P>(
        &self,
        batch: impl IntoIterator<Item = Event<T, P>>,
    ) -> Result<Vec<Event<T, P>>, AdmissionError> {
        self.lock().admit(batch)
    }

    pub fn admit_with_report<P>(
        &self,
        batch: impl IntoIterator<Item = Event<T, P>>,
    ) -> Result<AdmissionReport<T, P>, AdmissionError> {
        self.lock().admit_with_report(batch)
    }

    /// Snapshot of the current watermark.
    pub fn watermark(&self) -> Option<T> {
        self.lock().watermark().cloned()
    }

    pub fn admitted_count(&self) -> usize {
        self.lock().admitted_count()
    }
}
