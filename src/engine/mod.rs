//! # Engine
//!
//! The concurrent generation core: the work queue, the worker pool, and the
//! coordinator that drives the generation state machine. Only the
//! coordinator's entry points are public; jobs, queue and pool are
//! implementation detail.

pub mod coordinator;

mod job;
mod queue;
mod worker;

pub use coordinator::{EvolutionEngine, RunFailure};
