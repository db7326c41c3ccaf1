// src/error.rs
use thiserror::Error;

/// Error types for the shark-fin pricing engine
#[derive(Debug, Clone, Error)]
pub enum SharkfinError {
    /// Invalid numeric parameter value
    #[error("Invalid parameter '{parameter}' = {value}: {constraint}")]
    InvalidParameters {
        parameter: String,
        value: f64,
        constraint: String,
    },

    /// Structurally impossible configuration (counts, orderings, seed sets)
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Inputs that produced undefined math (NaN / infinite estimates)
    #[error("Numerically degenerate result in {method}: {reason}")]
    NumericDegenerate { method: String, reason: String },

    /// Unsupported operation
    #[error("Unsupported operation '{operation}' in context: {context}")]
    UnsupportedOperation { operation: String, context: String },

    /// Request or result (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SharkfinError {
    pub fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        SharkfinError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Non-zero status code reported in the response envelope.
    pub fn return_code(&self) -> i32 {
        match self {
            SharkfinError::InvalidParameters { .. } | SharkfinError::InvalidConfig { .. } => 1,
            SharkfinError::NumericDegenerate { .. } => 2,
            SharkfinError::UnsupportedOperation { .. } => 3,
            SharkfinError::Serialization(_) => 4,
        }
    }
}

impl From<serde_json::Error> for SharkfinError {
    fn from(err: serde_json::Error) -> Self {
        SharkfinError::Serialization(err.to_string())
    }
}

/// Result type alias for engine operations
pub type SharkfinResult<T> = Result<T, SharkfinError>;

/// Validation utilities
pub mod validation {
    use super::{SharkfinError, SharkfinResult};

    /// Validate that a parameter is positive
    pub fn validate_positive(name: &str, value: f64) -> SharkfinResult<()> {
        if value.is_nan() || value <= 0.0 {
            Err(SharkfinError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be positive (> 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is non-negative
    pub fn validate_non_negative(name: &str, value: f64) -> SharkfinResult<()> {
        if value.is_nan() || value < 0.0 {
            Err(SharkfinError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be non-negative (≥ 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is within a half-open range `[min, max)`
    pub fn validate_range(name: &str, value: f64, min: f64, max: f64) -> SharkfinResult<()> {
        if value.is_nan() || value < min || value >= max {
            Err(SharkfinError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: format!("must be in range [{}, {})", min, max),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a value is finite and not NaN
    pub fn validate_finite(name: &str, value: f64) -> SharkfinResult<()> {
        if !value.is_finite() {
            Err(SharkfinError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be finite (not NaN or infinite)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate paths count
    pub fn validate_paths(paths: usize) -> SharkfinResult<()> {
        if paths == 0 {
            Err(SharkfinError::invalid_config("runs_size", "must be greater than 0"))
        } else if paths > 100_000_000 {
            Err(SharkfinError::invalid_config(
                "runs_size",
                "exceeds maximum allowed (100 million)",
            ))
        } else {
            Ok(())
        }
    }

    /// Validate steps count
    pub fn validate_steps(steps: usize) -> SharkfinResult<()> {
        if steps == 0 {
            Err(SharkfinError::invalid_config("runs_step", "must be greater than 0"))
        } else if steps > 100_000 {
            Err(SharkfinError::invalid_config(
                "runs_step",
                "exceeds maximum allowed (100,000)",
            ))
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
        assert!(validate_positive("sigma", 0.2).is_ok());
        assert!(validate_positive("sigma", 0.0).is_err());
        assert!(validate_positive("sigma", -0.1).is_err());
        assert!(validate_positive("sigma", f64::NAN).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("price_limit_ratio", 0.1, 0.0, 1.0).is_ok());
        assert!(validate_range("price_limit_ratio", 0.0, 0.0, 1.0).is_ok());
        assert!(validate_range("price_limit_ratio", 1.0, 0.0, 1.0).is_err());
        assert!(validate_range("price_limit_ratio", -0.1, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_validate_counts() {
        assert!(validate_paths(100_000).is_ok());
        assert!(validate_paths(0).is_err());
        assert!(validate_steps(244).is_ok());
        assert!(validate_steps(0).is_err());
    }

    #[test]
    fn test_error_display() {
        let error = SharkfinError::InvalidParameters {
            parameter: "sigma".to_string(),
            value: -0.1,
            constraint: "must be non-negative".to_string(),
        };

        let display = format!("{}", error);
        assert!(display.contains("sigma"));
        assert!(display.contains("-0.1"));
        assert!(display.contains("non-negative"));
    }

    #[test]
    fn test_return_codes_are_non_zero() {
        let errors = [
            SharkfinError::invalid_config("rand_seed", "empty"),
            SharkfinError::NumericDegenerate {
                method: "price".to_string(),
                reason: "NaN".to_string(),
            },
            SharkfinError::UnsupportedOperation {
                operation: "remote".to_string(),
                context: "dispatch".to_string(),
            },
            SharkfinError::Serialization("eof".to_string()),
        ];
        for e in errors.iter() {
            assert_ne!(e.return_code(), 0, "{}", e);
        }
    }
}
