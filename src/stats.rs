//! # Run Statistics
//!
//! The `Stats` struct is the output of a run: an append-only sequence of
//! per-generation records, one per completed generation. Records are never
//! mutated after they are appended.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::challenge::Cell;

/// Snapshot taken at the selection stage of one generation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GenerationRecord<C: Cell> {
    /// A copy of the top-ranked cell.
    pub best_cell: C,
    /// Score of the top-ranked cell. Until a population has been evaluated
    /// at least once this is the initial placeholder score of `0.0`.
    pub best_fitness: f64,
    /// Mean score over the entries whose scores were valid at selection
    /// time, or `0.0` when none were.
    pub average_fitness: f64,
}

/// Accumulated per-generation records of a run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stats<C: Cell> {
    records: Vec<GenerationRecord<C>>,
}

impl<C: Cell> Stats<C> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, record: GenerationRecord<C>) {
        self.records.push(record);
    }

    /// One record per completed generation, in generation order.
    pub fn records(&self) -> &[GenerationRecord<C>] {
        &self.records
    }

    /// Number of completed generations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record of the last completed generation.
    pub fn last(&self) -> Option<&GenerationRecord<C>> {
        self.records.last()
    }
}

impl<C: Cell> Default for Stats<C> {
    fn default() -> Self {
        Self::new()
    }
}
