//! Ordered result collection, independent of completion order.
//!
//! [`ResultCollector`] is a fixed-size slot array sized to the batch at
//! construction. Workers write outcomes as tasks complete, in whatever order
//! completion happens; the caller drains by index, so result order is always
//! submission order. It is the only concurrently-mutated structure in the
//! execution layer, and it is safe precisely because each task owns exactly
//! one slot.

use crate::error::BatchError;
use crate::task::Outcome;
use std::sync::OnceLock;

/// Fixed-size, index-addressed outcome slots.
pub struct ResultCollector {
    slots: Vec<OnceLock<Outcome>>,
}

impl ResultCollector {
    /// A collector with one slot per task of the batch.
    pub fn new(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, OnceLock::new);
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record the outcome for one slot. Safe to call concurrently from many
    /// workers as long as each index is written exactly once.
    ///
    /// # Panics
    /// Panics on a second write to the same index, or on an out-of-range
    /// index. Both are programming errors, not recoverable conditions.
    pub fn set(&self, outcome: Outcome) {
        let index = outcome.index;
        let slot = self
            .slots
            .get(index as usize)
            .unwrap_or_else(|| panic!("outcome index {index} out of range for batch of {}", self.slots.len()));
        if slot.set(outcome).is_err() {
            panic!("result slot {index} written twice");
        }
    }

    /// Record the outcome only if the slot is still vacant. Used on
    /// cancellation paths where a racing late completion and the
    /// cancellation filler may both reach the same slot; the first writer
    /// wins and already-completed outcomes are preserved.
    pub fn set_if_vacant(&self, outcome: Outcome) -> bool {
        let index = outcome.index as usize;
        let Some(slot) = self.slots.get(index) else {
            panic!("outcome index {index} out of range for batch of {}", self.slots.len());
        };
        slot.set(outcome).is_ok()
    }

    /// Whether every slot has been written.
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|s| s.get().is_some())
    }

    /// Fill every vacant slot with a synthesized outcome (timeout or skip
    /// marker), returning how many were filled.
    pub fn finish_vacant(&self, fill: impl Fn(u32) -> Outcome) -> usize {
        let mut filled = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.get().is_none() && slot.set(fill(i as u32)).is_ok() {
                filled += 1;
            }
        }
        filled
    }

    /// Return all outcomes in index order.
    ///
    /// Fails with [`BatchError::IncompleteBatch`] if any slot is unfilled —
    /// partial or garbage data is never returned.
    pub fn drain(&self) -> Result<Vec<Outcome>, BatchError> {
        let len = self.slots.len();
        let missing = self.slots.iter().filter(|s| s.get().is_none()).count();
        if missing > 0 {
            return Err(BatchError::IncompleteBatch { missing, len });
        }
        Ok(self
            .slots
            .iter()
            .map(|s| s.get().cloned().expect("slot checked non-vacant"))
            .collect())
    }
}
