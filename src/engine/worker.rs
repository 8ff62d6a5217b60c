//! # Worker Pool
//!
//! A fixed set of long-lived worker threads, spawned once at run start and
//! joined at shutdown. Each worker loops claiming batches from the work
//! queue and dispatching jobs with an exhaustive match. Because the
//! coordinator partitions jobs over disjoint population slots, dispatch
//! touches entries without any per-entry locking.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::trace;

use crate::challenge::Challenge;
use crate::error::{EngineError, Result};
use crate::population::{Buffer, PopulationBuffers};

use super::job::Job;
use super::queue::{ClaimOutcome, WorkQueue};

pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `num_threads` workers against the shared queue and buffers.
    ///
    /// If a spawn fails partway, the already running workers are shut down
    /// and joined before the error is returned.
    pub fn spawn<Ch: Challenge>(
        num_threads: usize,
        batch_size: usize,
        retries: usize,
        queue: &Arc<WorkQueue>,
        buffers: &Arc<PopulationBuffers<Ch::Cell>>,
        challenge: &Arc<Ch>,
    ) -> Result<Self> {
        let mut handles = Vec::with_capacity(num_threads);
        for worker_index in 0..num_threads {
            let spawned = {
                let queue = Arc::clone(queue);
                let buffers = Arc::clone(buffers);
                let challenge = Arc::clone(challenge);
                thread::Builder::new()
                    .name(format!("genepool-worker-{worker_index}"))
                    .spawn(move || worker_loop(&queue, &buffers, &*challenge, batch_size, retries))
            };
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    queue.shutdown();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(EngineError::Execution(format!(
                        "failed to spawn worker thread: {e}"
                    )));
                }
            }
        }
        Ok(Self { handles })
    }

    /// Joins every worker. Callable only after the queue's stop flag has
    /// been raised.
    pub fn join(self) -> Result<()> {
        for handle in self.handles {
            if handle.join().is_err() {
                return Err(EngineError::Concurrency(
                    "worker thread panicked outside job dispatch".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn worker_loop<Ch: Challenge>(
    queue: &WorkQueue,
    buffers: &PopulationBuffers<Ch::Cell>,
    challenge: &Ch,
    batch_size: usize,
    retries: usize,
) {
    loop {
        match queue.claim_batch(batch_size, retries) {
            ClaimOutcome::Stop => return,
            ClaimOutcome::Batch(batch) => {
                // Once a fault is recorded the run is aborting; claimed
                // jobs are still accounted for so the barrier drains, but
                // their execution is skipped.
                if !queue.has_fault() {
                    let outcome = catch_unwind(AssertUnwindSafe(|| {
                        run_jobs(&batch.jobs, buffers, challenge)
                    }));
                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(fault)) => queue.record_fault(fault),
                        Err(_) => queue.record_fault(EngineError::Execution(
                            "user callback panicked".to_string(),
                        )),
                    }
                }
                if batch.generation_complete {
                    trace!("executed the final claim of the phase");
                }
                queue.finish_batch();
            }
        }
    }
}

fn run_jobs<Ch: Challenge>(
    jobs: &[Job],
    buffers: &PopulationBuffers<Ch::Cell>,
    challenge: &Ch,
) -> Result<()> {
    for job in jobs {
        dispatch(job, buffers, challenge)?;
    }
    Ok(())
}

fn dispatch<Ch: Challenge>(
    job: &Job,
    buffers: &PopulationBuffers<Ch::Cell>,
    challenge: &Ch,
) -> Result<()> {
    #[cfg(debug_assertions)]
    let _claim = buffers.tracker().claim(job.slots())?;

    match job {
        Job::Mutate { index, buffer } => {
            // SAFETY: slot sets of in-flight jobs are disjoint, so this job
            // holds the only reference to the entry.
            let entry = unsafe { buffers.entry_mut(*buffer, *index) };
            challenge.mutate(&mut entry.cell)?;
            entry.stale = true;
        }
        Job::Fitness { index } => {
            // SAFETY: as above.
            let entry = unsafe { buffers.entry_mut(Buffer::Current, *index) };
            let score = challenge.fitness(&entry.cell)?;
            if !score.is_finite() {
                return Err(EngineError::Execution(format!(
                    "non-finite fitness score: {score}"
                )));
            }
            entry.score = score;
            entry.stale = false;
        }
        Job::Crossover { parents, children } => {
            // SAFETY: parent slots are claimed by this job alone, and the
            // child slots live in the other buffer.
            let parent_cells: Vec<&Ch::Cell> = parents
                .iter()
                .map(|&index| unsafe { &buffers.entry_ref(Buffer::Current, index).cell })
                .collect();
            // SAFETY: child indices within one job are distinct, so each
            // mutable borrow is to a different entry.
            let mut child_cells: Vec<&mut Ch::Cell> = children
                .iter()
                .map(|&index| unsafe { &mut buffers.entry_mut(Buffer::Next, index).cell })
                .collect();
            challenge.crossover(&parent_cells, &mut child_cells)?;
            drop(child_cells);
            for &index in children {
                // SAFETY: as above.
                unsafe { buffers.entry_mut(Buffer::Next, index) }.stale = true;
            }
        }
    }
    Ok(())
}
