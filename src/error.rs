//! # Error Types
//!
//! This module defines the error types for the engine. The taxonomy follows
//! the three ways a run can fail: an invalid configuration rejected before
//! any worker thread is spawned, an opaque fault signalled by a user
//! callback during execution, and a violation of an internal engine
//! invariant.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use genepool::error::{EngineError, Result};
//!
//! fn some_function() -> Result<()> {
//!     // Function implementation
//!     Ok(())
//! }
//!
//! fn caller() {
//!     match some_function() {
//!         Ok(_) => println!("Success!"),
//!         Err(e) => println!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! Using the `ResultExt` trait to add context to errors:
//!
//! ```rust
//! use genepool::error::{Result, ResultExt};
//!
//! fn parse_threshold(raw: &str) -> Result<f64> {
//!     raw.parse::<f64>().context("Failed to parse threshold")
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Represents errors that can occur while configuring or running the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Error that occurs when an invalid strategy is provided.
    ///
    /// Detected by validation before any worker thread is spawned; a run
    /// failing with this variant has produced no partial state.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An opaque failure signalled by a user callback.
    ///
    /// Aborts the in-flight generation and stops the worker pool. The stats
    /// accumulated through the last fully completed generation are returned
    /// alongside this error.
    #[error("Execution fault: {0}")]
    Execution(String),

    /// Violation of an internal engine invariant, such as overlapping job
    /// index sets observed by the debug-mode ownership tracker.
    ///
    /// This is a defect in the engine itself. It is always fatal and never
    /// silently tolerated.
    #[error("Concurrency fault: {0}")]
    Concurrency(String),
}

/// A specialized Result type for engine operations.
///
/// This type is a convenience wrapper around `std::result::Result` with the
/// error type fixed to `EngineError`.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Extension trait for Result to add context to errors.
///
/// This trait provides a convenient way to add context to errors when
/// converting from one error type to `EngineError`. The converted error is
/// reported as an execution fault.
///
/// ## Examples
///
/// ```rust
/// use genepool::error::ResultExt;
///
/// fn read_weights(raw: &str) -> genepool::error::Result<f64> {
///     raw.parse::<f64>().context("Failed to read weights")
/// }
/// ```
pub trait ResultExt<T, E> {
    /// Adds context to an error.
    ///
    /// This method converts the error to an `EngineError` with the provided
    /// context.
    ///
    /// ## Arguments
    ///
    /// * `context` - A string providing context for the error.
    ///
    /// ## Returns
    ///
    /// A `Result<T, EngineError>` with the original value or a
    /// contextualized error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| EngineError::Execution(format!("{}: {}", context, e)))
    }
}
