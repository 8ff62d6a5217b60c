//! # Coordinator
//!
//! The single thread driving the generation state machine:
//! `INIT → MUTATE → EVALUATE → SELECT → (CROSSOVER →) BARRIER → … → DONE`.
//!
//! The coordinator builds each phase's job list, seals the queue, waits on
//! the generation-complete barrier, and is the only thread that ranks the
//! population, advances the sampling PRNG or swaps the population buffers.
//! Phases never overlap: a fitness job for a cell is never issued while a
//! mutation for that same cell is pending, and no generation's jobs are
//! submitted until the previous phase reports drained.

use std::cmp::Ordering;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::challenge::{Cell, Challenge};
use crate::error::{EngineError, Result};
use crate::population::{Buffer, CellEntry, PopulationBuffers};
use crate::rng::SampleSource;
use crate::stats::{GenerationRecord, Stats};
use crate::strategy::{FitnessDirection, SamplingPolicy, Strategy};

use super::job::{plan_crossover_jobs, Job};
use super::queue::WorkQueue;
use super::worker::WorkerPool;

/// A failed run: the error together with the stats accumulated through the
/// last fully completed generation.
///
/// Configuration errors fail before any state is built, so their `stats`
/// are empty.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure<C: Cell> {
    #[source]
    pub error: EngineError,
    pub stats: Stats<C>,
}

/// Drives a population through repeated generations of mutation,
/// evaluation, selection and crossover, parallelizing job execution across
/// a fixed pool of worker threads.
///
/// ## Example
///
/// ```rust
/// use genepool::challenge::Challenge;
/// use genepool::engine::EvolutionEngine;
/// use genepool::error::Result;
/// use genepool::strategy::{FitnessDirection, Strategy};
///
/// #[derive(Clone, Debug)]
/// struct Knob(f64);
///
/// struct TuneToZero;
///
/// impl Challenge for TuneToZero {
///     type Cell = Knob;
///
///     fn make_default_cell(&self) -> Result<Knob> {
///         Ok(Knob(4.0))
///     }
///
///     fn mutate(&self, cell: &mut Knob) -> Result<()> {
///         cell.0 *= 0.5;
///         Ok(())
///     }
///
///     fn fitness(&self, cell: &Knob) -> Result<f64> {
///         Ok(cell.0.abs())
///     }
/// }
///
/// let strategy = Strategy::builder()
///     .num_threads(2)
///     .num_cells(8)
///     .num_generations(3)
///     .mutation_chance(1.0)
///     .direction(FitnessDirection::Minimize)
///     .build();
///
/// let stats = EvolutionEngine::new(strategy, TuneToZero).run().unwrap();
/// assert_eq!(stats.len(), 3);
/// ```
pub struct EvolutionEngine<Ch: Challenge> {
    strategy: Strategy,
    challenge: Arc<Ch>,
}

impl<Ch: Challenge> EvolutionEngine<Ch> {
    /// Creates a new engine with the specified strategy and challenge.
    ///
    /// # Arguments
    ///
    /// * `strategy` - The run configuration; validated when `run` is called.
    /// * `challenge` - The user callbacks, bound once and shared by every
    ///   worker thread.
    pub fn new(strategy: Strategy, challenge: Ch) -> Self {
        Self {
            strategy,
            challenge: Arc::new(challenge),
        }
    }

    /// Runs the configured number of generations and returns the
    /// accumulated per-generation stats.
    ///
    /// All state lives only for the duration of this call: the population
    /// buffers and work queue are created here and destroyed before it
    /// returns, and every worker thread is joined before it returns.
    ///
    /// # Errors
    ///
    /// * `EngineError::Configuration` - the strategy failed validation.
    ///   Detected before any thread is spawned; no partial state exists.
    /// * `EngineError::Execution` - a user callback failed or panicked. The
    ///   in-flight generation is aborted and the pool stopped; the returned
    ///   `RunFailure` carries the stats up to the last completed
    ///   generation.
    /// * `EngineError::Concurrency` - an internal invariant was violated.
    ///   Always fatal.
    pub fn run(&self) -> std::result::Result<Stats<Ch::Cell>, RunFailure<Ch::Cell>> {
        if let Err(error) = self.strategy.validate() {
            return Err(RunFailure {
                error,
                stats: Stats::new(),
            });
        }

        let num_cells = self.strategy.get_num_cells();
        info!(
            num_cells,
            num_threads = self.strategy.get_num_threads(),
            num_generations = self.strategy.get_num_generations(),
            "starting run"
        );

        // INIT: build both buffers before any worker thread exists.
        let mut seeded = Vec::with_capacity(num_cells);
        for _ in 0..num_cells {
            match self.challenge.make_default_cell() {
                Ok(cell) => seeded.push(CellEntry::new(cell)),
                Err(error) => {
                    return Err(RunFailure {
                        error,
                        stats: Stats::new(),
                    })
                }
            }
        }
        let next = seeded.clone();
        let buffers = Arc::new(PopulationBuffers::new(seeded, next));
        debug_assert_eq!(buffers.len(), num_cells);

        let queue = Arc::new(WorkQueue::new());
        let pool = match WorkerPool::spawn(
            self.strategy.get_num_threads(),
            self.strategy.get_batch_size(),
            self.strategy.get_queue_retries(),
            &queue,
            &buffers,
            &self.challenge,
        ) {
            Ok(pool) => pool,
            Err(error) => {
                return Err(RunFailure {
                    error,
                    stats: Stats::new(),
                })
            }
        };

        let mut rng = SampleSource::from_seed(self.strategy.get_seed());
        let mut stats = Stats::new();
        let outcome = self.drive(&queue, &buffers, &mut rng, &mut stats);

        // DONE: raise the stop flag, wake everyone, join every worker.
        queue.shutdown();
        let joined = pool.join();

        if let Err(error) = outcome {
            warn!(%error, "run aborted");
            return Err(RunFailure { error, stats });
        }
        if let Err(error) = joined {
            return Err(RunFailure { error, stats });
        }
        info!(generations = stats.len(), "run complete");
        Ok(stats)
    }

    /// The generation loop. Returns early on the first fault reported by a
    /// drained phase, leaving `stats` at the last completed generation.
    fn drive(
        &self,
        queue: &WorkQueue,
        buffers: &PopulationBuffers<Ch::Cell>,
        rng: &mut SampleSource,
        stats: &mut Stats<Ch::Cell>,
    ) -> Result<()> {
        let num_cells = self.strategy.get_num_cells();
        for generation in 0..self.strategy.get_num_generations() {
            // MUTATE. Draining before the evaluate phase guarantees no
            // fitness job observes a half-mutated cell.
            if let Some(chance) = self.strategy.get_mutation_chance() {
                trace!(generation, "mutate phase");
                for index in 0..num_cells {
                    if rng.chance(chance) {
                        queue.submit(Job::Mutate {
                            index,
                            buffer: Buffer::Current,
                        });
                    }
                }
                drain_phase(queue)?;
            }

            // EVALUATE: entries that are stale and selected by the
            // sampling policy.
            trace!(generation, "evaluate phase");
            let sampling = self.strategy.get_sampling();
            let eligible: Vec<usize> = {
                // SAFETY: phase barrier; no jobs are in flight.
                let entries = unsafe { buffers.current_ref() };
                (0..num_cells)
                    .filter(|&index| {
                        entries[index].stale
                            && match sampling {
                                SamplingPolicy::All => true,
                                SamplingPolicy::Chance(chance) => rng.chance(chance),
                            }
                    })
                    .collect()
            };
            for index in eligible {
                queue.submit(Job::Fitness { index });
            }
            drain_phase(queue)?;

            // SELECT: rank in place and record the generation.
            let record = {
                // SAFETY: phase barrier; no jobs are in flight.
                let entries = unsafe { buffers.current_mut() };
                let direction = self.strategy.get_direction();
                entries.sort_by(|a, b| rank_order(a, b, direction));
                snapshot(entries)
            };
            debug!(
                generation,
                best = record.best_fitness,
                average = record.average_fitness,
                "selection complete"
            );
            stats.push(record);

            // CROSSOVER over the ranked population.
            if let Some(policy) = self.strategy.get_crossover() {
                trace!(generation, "crossover phase");
                // Slots not designated as children must carry over into the
                // next generation when the buffers are swapped.
                // SAFETY: phase barrier; no jobs are in flight.
                unsafe { buffers.refresh_next() };

                let jobs = plan_crossover_jobs(num_cells, policy);
                let child_targets: Vec<usize> = jobs
                    .iter()
                    .filter_map(|job| match job {
                        Job::Crossover { children, .. } => Some(children.iter().copied()),
                        _ => None,
                    })
                    .flatten()
                    .collect();
                for job in jobs {
                    queue.submit(job);
                }
                drain_phase(queue)?;

                // Second mutate pass over freshly written children only.
                if let Some(chance) = policy.get_child_mutation_chance() {
                    trace!(generation, "child mutation pass");
                    for index in child_targets {
                        if rng.chance(chance) {
                            queue.submit(Job::Mutate {
                                index,
                                buffer: Buffer::Next,
                            });
                        }
                    }
                    drain_phase(queue)?;
                }

                // BARRIER: last generation's children become this
                // generation's population.
                // SAFETY: phase barrier; no jobs are in flight.
                unsafe { buffers.swap() };
            }
        }
        Ok(())
    }
}

/// Seals the phase, waits for the drain, and surfaces the first fault
/// recorded while it ran. The queue is reset for the next phase either way.
fn drain_phase(queue: &WorkQueue) -> Result<()> {
    queue.mark_done_writing();
    queue.wait_generation_complete();
    let fault = queue.take_fault();
    queue.reset();
    match fault {
        Some(fault) => Err(fault),
        None => Ok(()),
    }
}

/// Ranks fresh entries above stale ones; among fresh entries the configured
/// direction decides. The caller's stable sort breaks ties by prior
/// position, keeping selection deterministic.
fn rank_order<C>(a: &CellEntry<C>, b: &CellEntry<C>, direction: FitnessDirection) -> Ordering {
    match (a.stale, b.stale) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
        (false, false) => {
            let ordering = match direction {
                FitnessDirection::Maximize => b.score.partial_cmp(&a.score),
                FitnessDirection::Minimize => a.score.partial_cmp(&b.score),
            };
            // Non-finite scores are rejected at dispatch, so fresh scores
            // always compare.
            ordering.unwrap_or(Ordering::Equal)
        }
    }
}

/// Snapshot of a ranked population: the top entry plus the mean over the
/// entries whose scores are valid.
fn snapshot<C: Cell>(entries: &[CellEntry<C>]) -> GenerationRecord<C> {
    let mut fresh = 0usize;
    let mut sum = 0.0;
    for entry in entries {
        if !entry.stale {
            fresh += 1;
            sum += entry.score;
        }
    }
    let average_fitness = if fresh > 0 { sum / fresh as f64 } else { 0.0 };
    let best = &entries[0];
    GenerationRecord {
        best_cell: best.cell.clone(),
        best_fitness: best.score,
        average_fitness,
    }
}
