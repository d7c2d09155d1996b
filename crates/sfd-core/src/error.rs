//! Unified error type for the sfd workspace.
//!
//! Every fallible operation in the engine returns [`SfdResult`]. The variants
//! mirror the failure policy of the pipeline: malformed input data and
//! infeasible dispatch demands are surfaced to the caller, while purely
//! numerical trouble inside a solve (a rank-deficient Jacobian, a degenerate
//! denominator) is handled internally and never reaches this type. A power
//! flow that runs out of iterations is *not* an error either; it is reported
//! through the solution's `converged` flag.

use thiserror::Error;

/// Unified error type for all sfd operations.
#[derive(Error, Debug)]
pub enum SfdError {
    /// I/O errors (file access while reading case tables)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Malformed case data: duplicate or missing bus numbers, zero series
    /// impedance, unsupported bus kind, mismatched table dimensions
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Solver/algorithm errors
    #[error("Solver error: {0}")]
    Solver(String),

    /// Dispatch demand outside the feasible generation range
    #[error("Infeasible dispatch: {0}")]
    Infeasible(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using SfdError.
pub type SfdResult<T> = Result<T, SfdError>;

impl From<anyhow::Error> for SfdError {
    fn from(err: anyhow::Error) -> Self {
        SfdError::Other(err.to_string())
    }
}

impl From<String> for SfdError {
    fn from(s: String) -> Self {
        SfdError::Other(s)
    }
}

impl From<&str> for SfdError {
    fn from(s: &str) -> Self {
        SfdError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for SfdError {
    fn from(err: serde_json::Error) -> Self {
        SfdError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SfdError::InvalidInput("duplicate bus number 4".into());
        assert!(err.to_string().contains("Invalid input"));
        assert!(err.to_string().contains("duplicate bus number 4"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SfdError = io_err.into();
        assert!(matches!(err, SfdError::Io(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> SfdResult<()> {
            Err(SfdError::Infeasible("demand above total Pmax".into()))
        }

        fn outer() -> SfdResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
