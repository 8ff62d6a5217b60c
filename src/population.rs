//! # Population Store
//!
//! A fixed-size, double-buffered collection of cell entries. The `current`
//! buffer is the generation being mutated and evaluated; crossover children
//! are written into `next` while `current` is read, and the coordinator
//! swaps the two at the generation barrier.
//!
//! Workers reach entries through unsafe accessors on `PopulationBuffers`.
//! The safety argument is external: the coordinator only submits jobs whose
//! slot sets are pairwise disjoint within a phase, so at most one job
//! touches any entry at a time and no per-entry locking is needed. Debug
//! builds verify the invariant at dispatch time with `OwnershipTracker`.

use std::cell::UnsafeCell;

#[cfg(any(test, debug_assertions))]
use std::collections::HashSet;
#[cfg(any(test, debug_assertions))]
use std::sync::Mutex;

#[cfg(any(test, debug_assertions))]
use crate::error::{EngineError, Result};

/// One slot of the population: a score, the exclusively owned cell value,
/// and the staleness flag marking the score as invalid.
#[derive(Debug, Clone)]
pub(crate) struct CellEntry<C> {
    pub score: f64,
    pub cell: C,
    pub stale: bool,
}

impl<C> CellEntry<C> {
    /// A new entry starts stale with a placeholder score, so it is ranked
    /// below every evaluated entry until its first fitness job runs.
    pub fn new(cell: C) -> Self {
        Self {
            score: 0.0,
            cell,
            stale: true,
        }
    }
}

/// Which of the two population buffers a slot index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Buffer {
    Current,
    Next,
}

/// The double-buffered population, shared between the coordinator and the
/// worker pool for the duration of one run.
pub(crate) struct PopulationBuffers<C> {
    current: UnsafeCell<Vec<CellEntry<C>>>,
    next: UnsafeCell<Vec<CellEntry<C>>>,
    num_cells: usize,
    #[cfg(debug_assertions)]
    tracker: OwnershipTracker,
}

// Entries are handed out to at most one job at a time (disjoint slot sets
// per phase, enforced by the coordinator and checked by the tracker), so
// sharing the buffers across worker threads is sound.
unsafe impl<C: Send + Sync> Sync for PopulationBuffers<C> {}

impl<C> PopulationBuffers<C> {
    pub fn new(current: Vec<CellEntry<C>>, next: Vec<CellEntry<C>>) -> Self {
        debug_assert_eq!(current.len(), next.len());
        let num_cells = current.len();
        Self {
            current: UnsafeCell::new(current),
            next: UnsafeCell::new(next),
            num_cells,
            #[cfg(debug_assertions)]
            tracker: OwnershipTracker::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.num_cells
    }

    #[cfg(debug_assertions)]
    pub fn tracker(&self) -> &OwnershipTracker {
        &self.tracker
    }

    fn buffer(&self, buffer: Buffer) -> *mut Vec<CellEntry<C>> {
        match buffer {
            Buffer::Current => self.current.get(),
            Buffer::Next => self.next.get(),
        }
    }

    /// Shared reference to one entry.
    ///
    /// # Safety
    ///
    /// No job holding a mutable claim on `(buffer, index)` may be in
    /// flight.
    pub unsafe fn entry_ref(&self, buffer: Buffer, index: usize) -> &CellEntry<C> {
        let buf: &Vec<CellEntry<C>> = &*self.buffer(buffer);
        &buf[index]
    }

    /// Mutable reference to one entry.
    ///
    /// # Safety
    ///
    /// The caller must hold the sole in-flight claim on `(buffer, index)`.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn entry_mut(&self, buffer: Buffer, index: usize) -> &mut CellEntry<C> {
        let buf: &mut Vec<CellEntry<C>> = &mut *self.buffer(buffer);
        &mut buf[index]
    }

    /// Shared view of the whole current buffer.
    ///
    /// # Safety
    ///
    /// Coordinator-only, at a phase barrier with no jobs in flight.
    pub unsafe fn current_ref(&self) -> &[CellEntry<C>] {
        &*self.current.get()
    }

    /// Mutable view of the whole current buffer, used by the selection
    /// stage to rank entries in place.
    ///
    /// # Safety
    ///
    /// Coordinator-only, at a phase barrier with no jobs in flight.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn current_mut(&self) -> &mut Vec<CellEntry<C>> {
        &mut *self.current.get()
    }

    /// Overwrites `next` with a copy of `current`, so that slots not
    /// designated as crossover children carry over into the next
    /// generation when the buffers are swapped.
    ///
    /// # Safety
    ///
    /// Coordinator-only, at a phase barrier with no jobs in flight.
    pub unsafe fn refresh_next(&self)
    where
        C: Clone,
    {
        (*self.next.get()).clone_from(&*self.current.get());
    }

    /// Swaps `current` and `next`, making last generation's children this
    /// generation's population.
    ///
    /// # Safety
    ///
    /// Coordinator-only, at a phase barrier with no jobs in flight.
    pub unsafe fn swap(&self) {
        std::mem::swap(&mut *self.current.get(), &mut *self.next.get());
    }
}

/// Debug-mode checker for the disjoint-ownership invariant.
///
/// Every job claims its slot set before dispatch and releases it after.
/// Two overlapping claims mean the coordinator built a job list with
/// overlapping index ranges; that is a defect, reported as a concurrency
/// fault and never silently tolerated.
#[cfg(any(test, debug_assertions))]
#[derive(Debug, Default)]
pub(crate) struct OwnershipTracker {
    claimed: Mutex<HashSet<(Buffer, usize)>>,
}

#[cfg(any(test, debug_assertions))]
impl OwnershipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims every slot in `slots`, failing without side effects if any
    /// of them is already held by an in-flight job.
    pub fn claim(&self, slots: Vec<(Buffer, usize)>) -> Result<SlotClaim<'_>> {
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        for (taken, slot) in slots.iter().enumerate() {
            if !claimed.insert(*slot) {
                for undo in &slots[..taken] {
                    claimed.remove(undo);
                }
                return Err(EngineError::Concurrency(format!(
                    "overlapping job claims for population slot {:?}",
                    slot
                )));
            }
        }
        drop(claimed);
        Ok(SlotClaim {
            tracker: self,
            slots,
        })
    }
}

/// Releases the claimed slots when dropped.
#[cfg(any(test, debug_assertions))]
pub(crate) struct SlotClaim<'a> {
    tracker: &'a OwnershipTracker,
    slots: Vec<(Buffer, usize)>,
}

#[cfg(any(test, debug_assertions))]
impl Drop for SlotClaim<'_> {
    fn drop(&mut self) {
        let mut claimed = self
            .tracker
            .claimed
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for slot in &self.slots {
            claimed.remove(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_buffers(values: &[f64]) -> PopulationBuffers<f64> {
        let current: Vec<CellEntry<f64>> = values.iter().map(|&v| CellEntry::new(v)).collect();
        let next = current.clone();
        PopulationBuffers::new(current, next)
    }

    #[test]
    fn test_new_entries_start_stale() {
        let entry = CellEntry::new(1.5);
        assert!(entry.stale);
        assert_eq!(entry.score, 0.0);
    }

    #[test]
    fn test_swap_exchanges_buffers() {
        let buffers = make_buffers(&[1.0, 2.0]);
        unsafe {
            buffers.entry_mut(Buffer::Next, 0).cell = 9.0;
            buffers.swap();
            assert_eq!(buffers.entry_ref(Buffer::Current, 0).cell, 9.0);
            assert_eq!(buffers.entry_ref(Buffer::Next, 0).cell, 1.0);
        }
    }

    #[test]
    fn test_refresh_next_copies_current() {
        let buffers = make_buffers(&[1.0, 2.0]);
        unsafe {
            buffers.entry_mut(Buffer::Current, 1).cell = 7.0;
            buffers.refresh_next();
            assert_eq!(buffers.entry_ref(Buffer::Next, 1).cell, 7.0);
        }
    }

    #[test]
    fn test_tracker_rejects_overlap() {
        let tracker = OwnershipTracker::new();
        let held = tracker
            .claim(vec![(Buffer::Current, 0), (Buffer::Current, 1)])
            .unwrap();
        let overlap = tracker.claim(vec![(Buffer::Current, 1)]);
        assert!(matches!(overlap, Err(EngineError::Concurrency(_))));
        // Same index in the other buffer is a different slot.
        assert!(tracker.claim(vec![(Buffer::Next, 1)]).is_ok());
        drop(held);
        assert!(tracker.claim(vec![(Buffer::Current, 1)]).is_ok());
    }

    #[test]
    fn test_tracker_failed_claim_leaves_no_residue() {
        let tracker = OwnershipTracker::new();
        let held = tracker.claim(vec![(Buffer::Current, 2)]).unwrap();
        assert!(tracker
            .claim(vec![(Buffer::Current, 0), (Buffer::Current, 2)])
            .is_err());
        // Slot 0 was rolled back by the failed claim.
        assert!(tracker.claim(vec![(Buffer::Current, 0)]).is_ok());
        drop(held);
    }
}
