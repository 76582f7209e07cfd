use thiserror::Error;

use crate::types::SensorType;

/// Filter error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Covariance lost positive definiteness; the estimate can no longer be trusted.
    #[error("{stage} covariance is not positive definite")]
    NotPositiveDefinite { stage: &'static str },

    /// Radar sigma point sits on the sensor origin, range is ~0.
    #[error("degenerate radar geometry at px={px}, py={py}")]
    DegenerateGeometry { px: f64, py: f64 },

    #[error("sensor mismatch: expected {expected} record, got {found}")]
    SensorMismatch {
        expected: SensorType,
        found: SensorType,
    },

    #[error("invalid filter configuration: {0}")]
    InvalidConfig(String),
}

impl FilterError {
    /// Numerical faults that leave the filter unusable until it is reset.
    ///
    /// Degenerate radar geometry is an expected edge case of polar sensing and
    /// only costs the current update.
    pub fn is_fatal(&self) -> bool {
        match self {
            FilterError::NotPositiveDefinite { .. } | FilterError::InvalidConfig(_) => true,
            FilterError::DegenerateGeometry { .. } | FilterError::SensorMismatch { .. } => false,
        }
    }
}

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;
