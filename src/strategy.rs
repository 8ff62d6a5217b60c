//! # Strategy
//!
//! The `Strategy` struct represents the immutable configuration of a run:
//! pool sizing, queue tuning knobs, per-phase toggles and chances, the PRNG
//! seed and the fitness direction. It is validated once at run entry,
//! before any worker thread is spawned.
//!
//! ## Example
//!
//! ```rust
//! use genepool::strategy::{CrossoverPolicy, FitnessDirection, SamplingPolicy, Strategy};
//!
//! let strategy = Strategy::builder()
//!     .num_threads(4)
//!     .num_cells(128)
//!     .num_generations(50)
//!     .sampling(SamplingPolicy::All)
//!     .mutation_chance(0.3)
//!     .crossover(CrossoverPolicy::new(2, 2, 2))
//!     .direction(FitnessDirection::Maximize)
//!     .build();
//!
//! assert!(strategy.validate().is_ok());
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Controls which stale entries get a fitness job each generation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SamplingPolicy {
    /// Every stale entry is evaluated every generation.
    All,
    /// Each stale entry is evaluated with the given probability.
    Chance(f64),
}

/// Sets whether higher or lower fitness values are considered better.
///
/// Use `Minimize` when the fitness callback computes an error measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitnessDirection {
    Maximize,
    Minimize,
}

/// Configuration of the crossover phase.
///
/// Each crossover job draws `parent_num` distinct high-ranked parents and
/// overwrites `children_num` low-ranked child slots. Successive jobs slide
/// the parent window by `parent_stride` ranks (never less than
/// `parent_num`, so windows cannot overlap) and always consume the next
/// `children_num` child slots from the bottom of the ranking.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CrossoverPolicy {
    parent_num: usize,
    parent_stride: usize,
    children_num: usize,
    child_mutation_chance: Option<f64>,
}

impl CrossoverPolicy {
    /// Creates a new `CrossoverPolicy` with the given parent arity, parent
    /// stride and child arity.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use genepool::strategy::CrossoverPolicy;
    ///
    /// let policy = CrossoverPolicy::new(2, 2, 2).with_child_mutation_chance(0.25);
    /// assert_eq!(policy.get_parent_num(), 2);
    /// ```
    pub fn new(parent_num: usize, parent_stride: usize, children_num: usize) -> Self {
        Self {
            parent_num,
            parent_stride,
            children_num,
            child_mutation_chance: None,
        }
    }

    /// Enables the post-crossover mutation pass with the given per-child
    /// probability.
    pub fn with_child_mutation_chance(mut self, chance: f64) -> Self {
        self.child_mutation_chance = Some(chance);
        self
    }

    pub fn get_parent_num(&self) -> usize {
        self.parent_num
    }

    pub fn get_parent_stride(&self) -> usize {
        self.parent_stride
    }

    pub fn get_children_num(&self) -> usize {
        self.children_num
    }

    pub fn get_child_mutation_chance(&self) -> Option<f64> {
        self.child_mutation_chance
    }
}

/// The immutable configuration of a run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Strategy {
    num_threads: usize,
    queue_retries: usize,
    batch_size: usize,
    num_cells: usize,
    num_generations: usize,
    sampling: SamplingPolicy,
    crossover: Option<CrossoverPolicy>,
    mutation_chance: Option<f64>,
    seed: u64,
    direction: FitnessDirection,
}

impl Strategy {
    /// Number of worker threads evaluating jobs.
    pub fn get_num_threads(&self) -> usize {
        self.num_threads
    }

    /// Number of non-blocking lock attempts a worker makes before it goes
    /// to sleep on the jobs-available condition.
    pub fn get_queue_retries(&self) -> usize {
        self.queue_retries
    }

    /// Number of jobs a worker tries to take per queue access.
    pub fn get_batch_size(&self) -> usize {
        self.batch_size
    }

    /// Size of the population pool.
    pub fn get_num_cells(&self) -> usize {
        self.num_cells
    }

    /// Number of generations to run.
    pub fn get_num_generations(&self) -> usize {
        self.num_generations
    }

    pub fn get_sampling(&self) -> SamplingPolicy {
        self.sampling
    }

    pub fn get_crossover(&self) -> Option<&CrossoverPolicy> {
        self.crossover.as_ref()
    }

    /// Per-entry mutation probability, or `None` when the mutation phase is
    /// disabled.
    pub fn get_mutation_chance(&self) -> Option<f64> {
        self.mutation_chance
    }

    pub fn get_seed(&self) -> u64 {
        self.seed
    }

    pub fn get_direction(&self) -> FitnessDirection {
        self.direction
    }

    /// Returns a builder for creating a `Strategy` instance.
    pub fn builder() -> StrategyBuilder {
        StrategyBuilder::default()
    }

    /// Checks the configuration for values the engine cannot run with.
    ///
    /// Called at run entry before any thread is spawned; a failing strategy
    /// produces no partial state.
    ///
    /// ## Errors
    ///
    /// Returns `EngineError::Configuration` when a count is zero, a chance
    /// is outside `[0, 1]`, or the population is too small to satisfy the
    /// requested crossover arities.
    pub fn validate(&self) -> Result<()> {
        if self.num_cells == 0 {
            return Err(EngineError::Configuration(
                "Population size cannot be zero".to_string(),
            ));
        }
        if self.num_threads == 0 {
            return Err(EngineError::Configuration(
                "Number of worker threads cannot be zero".to_string(),
            ));
        }
        if self.num_generations == 0 {
            return Err(EngineError::Configuration(
                "Number of generations cannot be zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(EngineError::Configuration(
                "Batch size cannot be zero".to_string(),
            ));
        }
        if let SamplingPolicy::Chance(chance) = self.sampling {
            validate_chance(chance, "Sampling chance")?;
        }
        if let Some(chance) = self.mutation_chance {
            validate_chance(chance, "Mutation chance")?;
        }
        if let Some(crossover) = &self.crossover {
            if crossover.parent_num == 0 {
                return Err(EngineError::Configuration(
                    "Crossover parent arity cannot be zero".to_string(),
                ));
            }
            if crossover.children_num == 0 {
                return Err(EngineError::Configuration(
                    "Crossover child arity cannot be zero".to_string(),
                ));
            }
            if crossover.parent_stride == 0 {
                return Err(EngineError::Configuration(
                    "Crossover parent stride cannot be zero".to_string(),
                ));
            }
            if let Some(chance) = crossover.child_mutation_chance {
                validate_chance(chance, "Child mutation chance")?;
            }
            let needed = crossover.parent_num + crossover.children_num;
            if self.num_cells < needed {
                return Err(EngineError::Configuration(format!(
                    "Population of {} cannot satisfy crossover with {} parents and {} children",
                    self.num_cells, crossover.parent_num, crossover.children_num
                )));
            }
        }
        Ok(())
    }
}

fn validate_chance(chance: f64, what: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&chance) {
        return Err(EngineError::Configuration(format!(
            "{} must be within [0, 1], got {}",
            what, chance
        )));
    }
    Ok(())
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            num_threads: 4,
            queue_retries: 10,
            batch_size: 16,
            num_cells: 64,
            num_generations: 100,
            sampling: SamplingPolicy::All,
            crossover: None,
            mutation_chance: None,
            seed: 0,
            direction: FitnessDirection::Maximize,
        }
    }
}

/// Builder for `Strategy`.
///
/// Provides a fluent interface for constructing `Strategy` instances;
/// unset fields fall back to the `Default` values.
#[derive(Debug, Clone, Default)]
pub struct StrategyBuilder {
    num_threads: Option<usize>,
    queue_retries: Option<usize>,
    batch_size: Option<usize>,
    num_cells: Option<usize>,
    num_generations: Option<usize>,
    sampling: Option<SamplingPolicy>,
    crossover: Option<CrossoverPolicy>,
    mutation_chance: Option<f64>,
    seed: Option<u64>,
    direction: Option<FitnessDirection>,
}

impl StrategyBuilder {
    /// Sets the number of worker threads.
    pub fn num_threads(mut self, value: usize) -> Self {
        self.num_threads = Some(value);
        self
    }

    /// Sets the trylock retry budget a worker spends before sleeping.
    pub fn queue_retries(mut self, value: usize) -> Self {
        self.queue_retries = Some(value);
        self
    }

    /// Sets the number of jobs claimed per queue access.
    pub fn batch_size(mut self, value: usize) -> Self {
        self.batch_size = Some(value);
        self
    }

    /// Sets the population size.
    pub fn num_cells(mut self, value: usize) -> Self {
        self.num_cells = Some(value);
        self
    }

    /// Sets the number of generations.
    pub fn num_generations(mut self, value: usize) -> Self {
        self.num_generations = Some(value);
        self
    }

    /// Sets the fitness sampling policy.
    pub fn sampling(mut self, value: SamplingPolicy) -> Self {
        self.sampling = Some(value);
        self
    }

    /// Enables crossover with the given policy.
    pub fn crossover(mut self, value: CrossoverPolicy) -> Self {
        self.crossover = Some(value);
        self
    }

    /// Enables mutation with the given per-entry probability.
    pub fn mutation_chance(mut self, value: f64) -> Self {
        self.mutation_chance = Some(value);
        self
    }

    /// Sets the PRNG seed for the coordinator's sampling decisions.
    pub fn seed(mut self, value: u64) -> Self {
        self.seed = Some(value);
        self
    }

    /// Sets the fitness direction.
    pub fn direction(mut self, value: FitnessDirection) -> Self {
        self.direction = Some(value);
        self
    }

    /// Builds the `Strategy` instance.
    pub fn build(self) -> Strategy {
        let defaults = Strategy::default();
        Strategy {
            num_threads: self.num_threads.unwrap_or(defaults.num_threads),
            queue_retries: self.queue_retries.unwrap_or(defaults.queue_retries),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            num_cells: self.num_cells.unwrap_or(defaults.num_cells),
            num_generations: self.num_generations.unwrap_or(defaults.num_generations),
            sampling: self.sampling.unwrap_or(defaults.sampling),
            crossover: self.crossover,
            mutation_chance: self.mutation_chance,
            seed: self.seed.unwrap_or(defaults.seed),
            direction: self.direction.unwrap_or(defaults.direction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let strategy = Strategy::builder().build();
        assert_eq!(strategy.get_num_threads(), 4);
        assert_eq!(strategy.get_queue_retries(), 10);
        assert!(strategy.get_crossover().is_none());
        assert!(strategy.get_mutation_chance().is_none());
        assert!(strategy.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        assert!(Strategy::builder().num_cells(0).build().validate().is_err());
        assert!(Strategy::builder().num_threads(0).build().validate().is_err());
        assert!(Strategy::builder()
            .num_generations(0)
            .build()
            .validate()
            .is_err());
        assert!(Strategy::builder().batch_size(0).build().validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_chances() {
        assert!(Strategy::builder()
            .mutation_chance(1.5)
            .build()
            .validate()
            .is_err());
        assert!(Strategy::builder()
            .sampling(SamplingPolicy::Chance(-0.1))
            .build()
            .validate()
            .is_err());
        assert!(Strategy::builder()
            .crossover(CrossoverPolicy::new(2, 2, 2).with_child_mutation_chance(2.0))
            .build()
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_rejects_undersized_population() {
        let strategy = Strategy::builder()
            .num_cells(3)
            .crossover(CrossoverPolicy::new(2, 2, 2))
            .build();
        match strategy.validate() {
            Err(EngineError::Configuration(msg)) => {
                assert!(msg.contains("cannot satisfy crossover"));
            }
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_zero_crossover_arities() {
        assert!(Strategy::builder()
            .crossover(CrossoverPolicy::new(0, 1, 2))
            .build()
            .validate()
            .is_err());
        assert!(Strategy::builder()
            .crossover(CrossoverPolicy::new(2, 0, 2))
            .build()
            .validate()
            .is_err());
        assert!(Strategy::builder()
            .crossover(CrossoverPolicy::new(2, 1, 0))
            .build()
            .validate()
            .is_err());
    }
}
