//! Unscented Kalman filter tracking a single object with a Constant Turn Rate
//! and Velocity (CTRV) model, fusing lidar position fixes and radar
//! range/bearing/range-rate returns.

pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod filters;
pub mod types;

pub use config::FilterConfig;
pub use error::{FilterError, FilterResult};
pub use filters::ukf_ctrv::{CtrvUkf, StepOutcome, TrackPhase, UkfCtrvState};
pub use types::{MeasurementPackage, RawMeasurement, SensorType};
