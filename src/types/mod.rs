pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Laser,
    Radar,
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorType::Laser => write!(f, "laser"),
            SensorType::Radar => write!(f, "radar"),
        }
    }
}

/// Raw sensor payload. The variant fixes both the sensor tag and the
/// number of measured values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sensor", rename_all = "lowercase")]
pub enum RawMeasurement {
    /// Cartesian position [m]
    Laser { px: f64, py: f64 },
    /// Range [m], bearing [rad], range rate [m/s]
    Radar { rho: f64, phi: f64, rho_dot: f64 },
}

impl RawMeasurement {
    pub fn sensor_type(&self) -> SensorType {
        match self {
            RawMeasurement::Laser { .. } => SensorType::Laser,
            RawMeasurement::Radar { .. } => SensorType::Radar,
        }
    }

    pub fn as_lidar(&self) -> Option<LidarVec> {
        match *self {
            RawMeasurement::Laser { px, py } => Some(LidarVec::new(px, py)),
            RawMeasurement::Radar { .. } => None,
        }
    }

    pub fn as_radar(&self) -> Option<RadarVec> {
        match *self {
            RawMeasurement::Radar { rho, phi, rho_dot } => Some(RadarVec::new(rho, phi, rho_dot)),
            RawMeasurement::Laser { .. } => None,
        }
    }
}

/// One timestamped sensor record, as produced by the log reader.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPackage {
    /// Timestamp [microseconds]
    pub timestamp: i64,

    pub raw: RawMeasurement,
}

impl MeasurementPackage {
    pub fn laser(timestamp: i64, px: f64, py: f64) -> Self {
        Self {
            timestamp,
            raw: RawMeasurement::Laser { px, py },
        }
    }

    pub fn radar(timestamp: i64, rho: f64, phi: f64, rho_dot: f64) -> Self {
        Self {
            timestamp,
            raw: RawMeasurement::Radar { rho, phi, rho_dot },
        }
    }

    pub fn sensor_type(&self) -> SensorType {
        self.raw.sensor_type()
    }
}

/// Reference trajectory sample carried next to a record in simulation logs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub px: f64,
    pub py: f64,
    pub vx: f64,
    pub vy: f64,
    pub yaw: Option<f64>,
    pub yaw_rate: Option<f64>,
}
