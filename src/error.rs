//! Unified error handling for the tracefilter library.
//!
//! Every fallible operation returns [`Result`]; nothing is caught or retried
//! internally.

use std::fmt;

/// Unified error type for cleaning and query operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceFilterError {
    /// A grouping key or feature column required by the operation is absent
    MissingColumn { column: String },
    /// Unknown trajectory distance measure selector
    InvalidMeasure { name: String },
    /// A parameter is outside its valid domain
    InvalidParameter { name: String, message: String },
    /// Configuration could not be parsed
    ConfigError { message: String },
    /// Generic internal error
    Internal { message: String },
}

impl fmt::Display for TraceFilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceFilterError::MissingColumn { column } => {
                write!(f, "Column '{}' not in collection", column)
            }
            TraceFilterError::InvalidMeasure { name } => {
                write!(
                    f,
                    "Unknown distance measure '{}'. Use MEDP or MEDT",
                    name
                )
            }
            TraceFilterError::InvalidParameter { name, message } => {
                write!(f, "Invalid parameter '{}': {}", name, message)
            }
            TraceFilterError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            TraceFilterError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for TraceFilterError {}

impl From<serde_json::Error> for TraceFilterError {
    fn from(err: serde_json::Error) -> Self {
        TraceFilterError::ConfigError {
            message: err.to_string(),
        }
    }
}

/// Result type alias for tracefilter operations.
pub type Result<T> = std::result::Result<T, TraceFilterError>;

/// Extension trait for converting Option to TraceFilterError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a missing column error.
    fn ok_or_missing_column(self, column: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing_column(self, column: &str) -> Result<T> {
        self.ok_or_else(|| TraceFilterError::MissingColumn {
            column: column.to_string(),
        })
    }
}

/// Reject NaN/infinite thresholds before they reach a comparison.
pub(crate) fn ensure_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TraceFilterError::InvalidParameter {
            name: name.to_string(),
            message: format!("expected a finite value, got {}", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TraceFilterError::MissingColumn {
            column: "tid".to_string(),
        };
        assert_eq!(err.to_string(), "Column 'tid' not in collection");

        let err = TraceFilterError::InvalidMeasure {
            name: "DTW".to_string(),
        };
        assert!(err.to_string().contains("DTW"));
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_missing_column("dist_to_prev");
        assert!(matches!(
            result,
            Err(TraceFilterError::MissingColumn { .. })
        ));
        assert_eq!(Some(3).ok_or_missing_column("dist_to_prev"), Ok(3));
    }

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite("speed_max", 50.0).is_ok());
        assert!(matches!(
            ensure_finite("speed_max", f64::NAN),
            Err(TraceFilterError::InvalidParameter { .. })
        ));
    }
}
