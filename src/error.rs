//! Error types for solver assembly and execution.

use std::fmt;

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assembling or running a solver.
///
/// Numerical degeneracy is deliberately absent: conditions such as conjugate
/// gradient hitting zero curvature, or a residual reaching exactly zero, are
/// treated as legitimate early termination and never surface as errors.
#[derive(Debug, Clone)]
pub enum Error {
    /// Mutually exclusive or ill-formed options detected at assembly time.
    InvalidConfiguration { message: String },

    /// Unrecognized solver name passed as an explicit method override.
    UnknownAlgorithm { name: String },

    /// Buffer length does not match the operator or operand it is paired with.
    ShapeMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },

    /// A lifecycle method ran before the state it needs was initialized.
    Uninitialized { context: String },

    /// Failure reported by the underlying compute backend.
    Backend { message: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfiguration { message } => {
                write!(f, "invalid configuration: {}", message)
            }
            Self::UnknownAlgorithm { name } => {
                write!(f, "unknown algorithm '{}'", name)
            }
            Self::ShapeMismatch {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "{}: expected length {}, got {}",
                    context, expected, actual
                )
            }
            Self::Uninitialized { context } => {
                write!(f, "{}: used before init", context)
            }
            Self::Backend { message } => {
                write!(f, "backend error: {}", message)
            }
        }
    }
}

impl std::error::Error for Error {}
