//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
///
/// Public operations return [`anyhow::Result`]; these variants are the payloads
/// and can be recovered with `err.downcast_ref::<SteerError>()`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SteerError {
    /// Sampling was requested from a store holding fewer items than the batch size.
    #[error("Insufficient data: {required} items required, {available} available")]
    InsufficientData {
        /// Requested batch size.
        required: usize,
        /// Number of items in the store.
        available: usize,
    },

    /// A priority was negative or non-finite.
    #[error("Invalid priority: {0}")]
    InvalidPriority(f32),

    /// An array did not have the expected length or shape.
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// What was being checked.
        what: String,
        /// Expected length or dimension.
        expected: usize,
        /// Actual length or dimension.
        actual: usize,
    },

    /// A configuration value violates a startup precondition.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Online and target networks do not share the same parameter layout.
    #[error("Parameter layout mismatch between online and target networks: {0}")]
    ParamLayoutMismatch(String),

    /// An index was outside of the valid range.
    #[error("Index {index} out of range (len = {len})")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The valid length.
        len: usize,
    },

    /// A vehicle was stepped while not in the active state.
    #[error("Agent {0} is not active")]
    AgentNotActive(usize),

    /// A reset was requested for a vehicle whose episode has not ended.
    #[error("Agent {0} is not in a terminal state")]
    AgentNotTerminal(usize),

    /// A vehicle appeared more than once in a reset request.
    #[error("Agent {0} was requested more than once")]
    DuplicateAgent(usize),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),
}
