//! # Challenge Trait
//!
//! The `Challenge` trait bundles the four user callbacks the engine is
//! parameterized over: cell construction, mutation, crossover and fitness
//! evaluation. The engine never inspects cell contents; it only moves cells
//! between population slots and hands them to these callbacks.
//!
//! ## Example
//!
//! ```rust
//! use genepool::challenge::Challenge;
//! use genepool::error::Result;
//!
//! #[derive(Clone, Debug)]
//! struct Reading {
//!     value: f64,
//! }
//!
//! struct Calibration {
//!     target: f64,
//! }
//!
//! impl Challenge for Calibration {
//!     type Cell = Reading;
//!
//!     fn make_default_cell(&self) -> Result<Reading> {
//!         Ok(Reading { value: 0.0 })
//!     }
//!
//!     fn mutate(&self, cell: &mut Reading) -> Result<()> {
//!         cell.value += 0.5;
//!         Ok(())
//!     }
//!
//!     fn fitness(&self, cell: &Reading) -> Result<f64> {
//!         Ok(-(cell.value - self.target).abs())
//!     }
//! }
//! ```

use std::fmt::Debug;

use crate::error::Result;

/// Bound alias for types usable as cells in the population.
///
/// A cell is opaque to the engine. It must be cloneable (the best cell of
/// each generation is recorded by value, and the double-buffered population
/// is refreshed by cloning), debuggable, and safe to hand across worker
/// threads.
pub trait Cell: Clone + Debug + Send + Sync + 'static {}

impl<T: Clone + Debug + Send + Sync + 'static> Cell for T {}

/// The user-supplied callbacks driving a run.
///
/// One value implementing `Challenge` is bound at run entry and shared by
/// every worker thread, so implementations must be `Send + Sync`. All
/// callbacks are fallible: an `Err` from any of them is reported as an
/// execution fault, aborts the in-flight generation and stops the pool.
///
/// Callbacks for disabled phases are never invoked; `mutate` and
/// `crossover` have no-op default implementations so a configuration
/// without those phases only has to supply construction and fitness.
pub trait Challenge: Send + Sync + 'static {
    /// The cell type this challenge operates on.
    type Cell: Cell;

    /// Produces one fresh cell for the initial population.
    ///
    /// Called `num_cells` times on the coordinator thread before any worker
    /// is spawned. Entries built from these cells start out stale.
    fn make_default_cell(&self) -> Result<Self::Cell>;

    /// Mutates a cell in place.
    ///
    /// Invoked on a worker thread for each entry the coordinator selected
    /// for mutation. The entry is marked stale afterwards, so its fitness
    /// is recomputed before it is ranked again.
    fn mutate(&self, _cell: &mut Self::Cell) -> Result<()> {
        Ok(())
    }

    /// Combines `parents` into `children`.
    ///
    /// `parents` are read-only references to high-ranked cells of the
    /// current generation; `children` are slots to overwrite in the next
    /// generation's buffer. The slice lengths match the configured parent
    /// and child arities. Children are marked stale after this returns.
    ///
    /// Implementations should treat the child slots as write-only: the
    /// values found in them are leftovers from the previous generation.
    fn crossover(
        &self,
        _parents: &[&Self::Cell],
        _children: &mut [&mut Self::Cell],
    ) -> Result<()> {
        Ok(())
    }

    /// Scores a cell.
    ///
    /// Invoked on a worker thread for each entry that is stale and selected
    /// by the sampling policy. Higher or lower scores win depending on the
    /// configured fitness direction. Non-finite scores are rejected as
    /// execution faults.
    fn fitness(&self, cell: &Self::Cell) -> Result<f64>;
}
