//! # Work Queue
//!
//! A generation-scoped, single-producer/multi-consumer job buffer. The
//! coordinator appends jobs and marks the queue done-writing; workers claim
//! batches with a bounded number of non-blocking lock attempts before
//! sleeping on the jobs-available condition. The retry-then-sleep policy
//! keeps workers busy under light contention (batch claiming amortizes lock
//! acquisition) without spinning a CPU while the queue sits empty.
//!
//! A phase is complete when the queue is done-writing, every job has been
//! claimed, and every claimed batch has finished executing. The
//! generation-complete condition signals the coordinator's barrier wait;
//! duplicate notifications are harmless because the coordinator re-checks
//! the predicate after every wake.

use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::trace;

use crate::error::EngineError;

use super::job::Job;

#[derive(Debug)]
struct QueueState {
    jobs: Vec<Job>,
    read_i: usize,
    in_flight: usize,
    done_writing: bool,
    stop: bool,
    fault: Option<EngineError>,
}

impl QueueState {
    fn drained(&self) -> bool {
        self.done_writing && self.read_i == self.jobs.len() && self.in_flight == 0
    }
}

/// A batch of claimed jobs.
///
/// `generation_complete` is set when this claim took the final unclaimed
/// jobs of the phase; the claiming worker re-notifies the barrier after
/// executing the batch.
pub(crate) struct JobBatch {
    pub jobs: Vec<Job>,
    pub generation_complete: bool,
}

/// Result of one claim attempt.
pub(crate) enum ClaimOutcome {
    Batch(JobBatch),
    Stop,
}

pub(crate) struct WorkQueue {
    state: Mutex<QueueState>,
    jobs_available: Condvar,
    generation_complete: Condvar,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: Vec::new(),
                read_i: 0,
                in_flight: 0,
                done_writing: false,
                stop: false,
                fault: None,
            }),
            jobs_available: Condvar::new(),
            generation_complete: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends one job. Coordinator-only; never called concurrently with
    /// itself.
    pub fn submit(&self, job: Job) {
        let mut state = self.lock();
        debug_assert!(!state.done_writing);
        state.jobs.push(job);
        drop(state);
        self.jobs_available.notify_one();
    }

    /// Seals the current phase's job list and wakes every sleeping worker
    /// so they can observe completion.
    pub fn mark_done_writing(&self) {
        let mut state = self.lock();
        state.done_writing = true;
        drop(state);
        self.jobs_available.notify_all();
    }

    /// Claims up to `batch_size` jobs.
    ///
    /// Makes up to `retries` non-blocking attempts to take the data lock;
    /// when the budget is exhausted, or the queue turns out to be empty,
    /// the worker blocks on the jobs-available condition until the
    /// coordinator submits more work or signals shutdown. The stop flag is
    /// checked on every wake.
    pub fn claim_batch(&self, batch_size: usize, retries: usize) -> ClaimOutcome {
        loop {
            for _ in 0..retries {
                if let Ok(mut state) = self.state.try_lock() {
                    if state.stop {
                        return ClaimOutcome::Stop;
                    }
                    if state.read_i < state.jobs.len() {
                        return ClaimOutcome::Batch(Self::take_batch(&mut state, batch_size));
                    }
                    // Empty under the lock; retrying cannot help.
                    break;
                }
            }

            let mut state = self.lock();
            loop {
                if state.stop {
                    return ClaimOutcome::Stop;
                }
                if state.read_i < state.jobs.len() {
                    return ClaimOutcome::Batch(Self::take_batch(&mut state, batch_size));
                }
                state = self
                    .jobs_available
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }
        }
    }

    fn take_batch(state: &mut QueueState, batch_size: usize) -> JobBatch {
        let remaining = state.jobs.len() - state.read_i;
        let take = batch_size.min(remaining);
        let jobs = state.jobs[state.read_i..state.read_i + take].to_vec();
        state.read_i += take;
        state.in_flight += 1;
        let generation_complete = state.done_writing && state.read_i == state.jobs.len();
        JobBatch {
            jobs,
            generation_complete,
        }
    }

    /// Accounts a claimed batch as executed and notifies the barrier once
    /// the phase is fully drained.
    pub fn finish_batch(&self) {
        let mut state = self.lock();
        debug_assert!(state.in_flight > 0);
        state.in_flight -= 1;
        if state.drained() {
            drop(state);
            self.generation_complete.notify_all();
        }
    }

    /// Blocks the coordinator until every submitted job has been claimed
    /// and executed. Fast-paths when the phase already drained.
    pub fn wait_generation_complete(&self) {
        let mut state = self.lock();
        while !state.drained() {
            state = self
                .generation_complete
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Clears jobs and cursors for the next phase.
    pub fn reset(&self) {
        let mut state = self.lock();
        debug_assert!(state.drained());
        trace!(drained_jobs = state.jobs.len(), "queue reset");
        state.jobs.clear();
        state.read_i = 0;
        state.done_writing = false;
    }

    /// Records the first fault of the run; later faults are dropped.
    pub fn record_fault(&self, fault: EngineError) {
        let mut state = self.lock();
        if state.fault.is_none() {
            state.fault = Some(fault);
        }
    }

    pub fn has_fault(&self) -> bool {
        self.lock().fault.is_some()
    }

    pub fn take_fault(&self) -> Option<EngineError> {
        self.lock().fault.take()
    }

    /// Sets the stop flag and wakes every sleeping worker.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.stop = true;
        drop(state);
        self.jobs_available.notify_all();
    }
}
