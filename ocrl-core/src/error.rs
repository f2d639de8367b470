//! Errors in the library.
use thiserror::Error;

/// Errors raised by the components of this crate.
#[derive(Error, Debug, PartialEq)]
pub enum OcrlError {
    /// A component name was not found in the registry of its kind.
    #[error("Unknown {kind}: '{name}'")]
    UnknownComponent {
        /// Kind of the component, e.g. `buffer`.
        kind: String,
        /// The name that failed to resolve.
        name: String,
    },

    /// A configuration value was rejected at setup.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tried to sample from a buffer holding no transitions.
    #[error("Cannot sample from an empty buffer")]
    EmptyBuffer,

    /// Length of a vector does not match the dimension fixed at construction.
    #[error("Dimension mismatch of {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Name of the mismatched quantity.
        what: String,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
