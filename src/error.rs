// src/error.rs
use std::fmt;

/// Error types for the spill-sde library
#[derive(Debug, Clone)]
pub enum SdeError {
    /// Invalid parameter values
    InvalidParameters {
        parameter: String,
        value: f64,
        constraint: String,
    },

    /// Invalid configuration (counts, shapes, orderings)
    InvalidConfiguration { field: String, reason: String },

    /// Simulated and observed series of different lengths
    LengthMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },

    /// Non-finite values produced by a simulation or residual evaluation
    NumericalInstability { method: String, reason: String },

    /// Calibration could not be carried out
    CalibrationError {
        reason: String,
        current_error: Option<f64>,
    },
}

/// Coarse classification of [`SdeError`] for callers that only need to branch
/// on the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NumericalInstability,
    Calibration,
}

impl SdeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SdeError::InvalidParameters { .. }
            | SdeError::InvalidConfiguration { .. }
            | SdeError::LengthMismatch { .. } => ErrorKind::InvalidArgument,
            SdeError::NumericalInstability { .. } => ErrorKind::NumericalInstability,
            SdeError::CalibrationError { .. } => ErrorKind::Calibration,
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        self.kind() == ErrorKind::InvalidArgument
    }
}

impl fmt::Display for SdeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdeError::InvalidParameters {
                parameter,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid parameter '{}' = {}: {}",
                    parameter, value, constraint
                )
            }
            SdeError::InvalidConfiguration { field, reason } => {
                write!(f, "Invalid configuration for '{}': {}", field, reason)
            }
            SdeError::LengthMismatch {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "Length mismatch in {}: expected {} samples, got {}",
                    context, expected, actual
                )
            }
            SdeError::NumericalInstability { method, reason } => {
                write!(f, "Numerical instability in {}: {}", method, reason)
            }
            SdeError::CalibrationError {
                reason,
                current_error,
            } => match current_error {
                Some(err) => write!(
                    f,
                    "Calibration failed (current error: {:.6}): {}",
                    err, reason
                ),
                None => write!(f, "Calibration failed: {}", reason),
            },
        }
    }
}

impl std::error::Error for SdeError {}

/// Result type alias for spill-sde operations
pub type SdeResult<T> = Result<T, SdeError>;

/// Validation utilities
pub mod validation {
    use super::{SdeError, SdeResult};

    /// Validate that a parameter is positive
    pub fn validate_positive(name: &str, value: f64) -> SdeResult<()> {
        // NaN fails the comparison, so reject it explicitly
        if value.is_nan() || value <= 0.0 {
            Err(SdeError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be positive (> 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is non-negative
    pub fn validate_non_negative(name: &str, value: f64) -> SdeResult<()> {
        if value.is_nan() || value < 0.0 {
            Err(SdeError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be non-negative (≥ 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is within a closed range
    pub fn validate_range(name: &str, value: f64, min: f64, max: f64) -> SdeResult<()> {
        if value.is_nan() || value < min || value > max {
            Err(SdeError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: format!("must be in range [{}, {}]", min, max),
            })
        } else {
            Ok(())
        }
    }

    /// Validate correlation parameter
    pub fn validate_correlation(name: &str, rho: f64) -> SdeResult<()> {
        validate_range(name, rho, -1.0, 1.0)
    }

    /// Validate that a value is finite and not NaN
    pub fn validate_finite(name: &str, value: f64) -> SdeResult<()> {
        if !value.is_finite() {
            Err(SdeError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be finite (not NaN or infinite)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a count is at least `min`
    pub fn validate_count(field: &str, count: usize, min: usize) -> SdeResult<()> {
        if count < min {
            Err(SdeError::InvalidConfiguration {
                field: field.to_string(),
                reason: format!("must be at least {}, got {}", min, count),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that two series line up sample for sample
    pub fn validate_same_length(context: &str, expected: usize, actual: usize) -> SdeResult<()> {
        if expected != actual {
            Err(SdeError::LengthMismatch {
                expected,
                actual,
                context: context.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::validation::*;
    use super::*;

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive("s0", 56.0).is_ok());
        assert!(validate_positive("s0", 0.0).is_err());
        assert!(validate_positive("s0", -0.1).is_err());
        assert!(validate_positive("s0", f64::NAN).is_err());
    }

    #[test]
    fn test_validate_correlation() {
        assert!(validate_correlation("rho", 0.25).is_ok());
        assert!(validate_correlation("rho", 1.0).is_ok());
        assert!(validate_correlation("rho", -1.0).is_ok());
        assert!(validate_correlation("rho", 1.0001).is_err());
        assert!(validate_correlation("rho", -1.1).is_err());
        assert!(validate_correlation("rho", f64::NAN).is_err());
    }

    #[test]
    fn test_validate_finite() {
        assert!(validate_finite("r", 1.0).is_ok());
        assert!(validate_finite("r", f64::NAN).is_err());
        assert!(validate_finite("r", f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_count_and_length() {
        assert!(validate_count("days", 1, 1).is_ok());
        assert!(validate_count("days", 0, 1).is_err());
        assert!(validate_same_length("window", 30, 30).is_ok());

        let err = validate_same_length("window", 30, 29).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_error_kinds() {
        let instability = SdeError::NumericalInstability {
            method: "simulate".to_string(),
            reason: "price overflow".to_string(),
        };
        assert_eq!(instability.kind(), ErrorKind::NumericalInstability);
        assert!(!instability.is_invalid_argument());

        let calibration = SdeError::CalibrationError {
            reason: "empty window".to_string(),
            current_error: None,
        };
        assert_eq!(calibration.kind(), ErrorKind::Calibration);
    }

    #[test]
    fn test_error_display() {
        let error = SdeError::LengthMismatch {
            expected: 30,
            actual: 60,
            context: "calibration window".to_string(),
        };

        let display = format!("{}", error);
        assert!(display.contains("calibration window"));
        assert!(display.contains("30"));
        assert!(display.contains("60"));
    }
}
