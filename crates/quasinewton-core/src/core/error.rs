//! Error types for quasi-Newton optimization.
//!
//! Only configuration mistakes are reported as errors. Outcomes of a run
//! (a failed line search, a degenerate update) are terminal statuses of the
//! optimizer, not errors, see [`TerminationReason`](crate::optimization::TerminationReason).

use thiserror::Error;

/// Errors that can occur while configuring or driving an optimizer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    /// Dimension mismatch between collaborators.
    ///
    /// This error occurs when the objective and its gradient disagree on the
    /// number of parameters, or when an initial guess or initial inverse
    /// Hessian does not match the bound problem.
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Where the mismatch was detected
        context: String,
        /// Expected dimensions
        expected: String,
        /// Actual dimensions
        actual: String,
    },

    /// Invalid optimizer configuration.
    ///
    /// This error occurs when the optimizer or its line search is configured
    /// with invalid parameters (e.g., negative tolerance, c2 <= c1).
    #[error("Invalid optimizer configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
        /// Name of the invalid parameter
        parameter: String,
        /// Value that was invalid
        value: String,
    },

    /// The optimizer was stepped before being given an initial guess.
    #[error("Optimizer has not been initialized with a starting point")]
    NotInitialized,
}

impl OptimizerError {
    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch<S, E, A>(context: S, expected: E, actual: A) -> Self
    where
        S: Into<String>,
        E: std::fmt::Display,
        A: std::fmt::Display,
    {
        Self::DimensionMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S1, S2, S3>(reason: S1, parameter: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidConfiguration {
            reason: reason.into(),
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    /// Create an InvalidConfiguration error for a scalar parameter.
    pub fn invalid_parameter<S, V>(reason: S, parameter: &str, value: V) -> Self
    where
        S: Into<String>,
        V: std::fmt::Display,
    {
        Self::invalid_configuration(reason, parameter, value.to_string())
    }
}

/// Result type alias for optimizer operations.
pub type OptimizerResult<T> = std::result::Result<T, OptimizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = OptimizerError::dimension_mismatch("gradient", 3, 2);
        assert!(matches!(err, OptimizerError::DimensionMismatch { .. }));
        assert_eq!(
            err.to_string(),
            "Dimension mismatch in gradient: expected 3, got 2"
        );
    }

    #[test]
    fn test_invalid_configuration_context() {
        let err = OptimizerError::invalid_parameter("must be non-negative", "absolute_tolerance", -1.0);

        if let OptimizerError::InvalidConfiguration {
            reason,
            parameter,
            value,
        } = &err
        {
            assert_eq!(reason, "must be non-negative");
            assert_eq!(parameter, "absolute_tolerance");
            assert_eq!(value, "-1");
        } else {
            panic!("Expected InvalidConfiguration variant");
        }
        assert!(err.to_string().contains("Invalid optimizer configuration"));
    }

    #[test]
    fn test_error_display() {
        let errors = vec![
            OptimizerError::dimension_mismatch("initial guess", 2, 5),
            OptimizerError::invalid_configuration("c2 must exceed c1", "c2", "0.00001"),
            OptimizerError::NotInitialized,
        ];

        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }
}
