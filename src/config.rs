//! Filter configuration
//!
//! Every tunable of the filter lives here and is passed to the constructor.
//! Defaults are the tuned values for the simulated lidar/radar dataset.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, FilterResult};
use crate::types::{LidarNoise, RadarNoise, StateMat, StateVec, AUG_STATE_DIM, STATE_DIM};

/// Process noise standard deviations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessNoise {
    /// Longitudinal acceleration [m/s²]
    pub std_a: f64,

    /// Yaw acceleration [rad/s²]
    pub std_yawdd: f64,
}

impl Default for ProcessNoise {
    fn default() -> Self {
        Self {
            std_a: 0.8,
            std_yawdd: 0.6,
        }
    }
}

/// Lidar measurement noise standard deviations [m]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LidarNoiseStd {
    pub std_px: f64,
    pub std_py: f64,
}

impl Default for LidarNoiseStd {
    fn default() -> Self {
        Self {
            std_px: 0.15,
            std_py: 0.15,
        }
    }
}

/// Radar measurement noise standard deviations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarNoiseStd {
    /// Range [m]
    pub std_rho: f64,

    /// Bearing [rad]
    pub std_phi: f64,

    /// Range rate [m/s]
    pub std_rho_dot: f64,
}

impl Default for RadarNoiseStd {
    fn default() -> Self {
        Self {
            std_rho: 0.3,
            std_phi: 0.03,
            std_rho_dot: 0.3,
        }
    }
}

/// Unscented transform parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadParams {
    /// Spread of sigma points (typically 1e-3)
    pub alpha: f64,

    /// Prior knowledge (2.0 for Gaussian)
    pub beta: f64,

    /// Secondary scaling (0.0 or 3-n)
    pub kappa: f64,
}

impl Default for SpreadParams {
    fn default() -> Self {
        Self {
            alpha: 1e-3,
            beta: 2.0,
            kappa: 0.0,
        }
    }
}

impl SpreadParams {
    /// Combined scaling parameter for the augmented state
    pub fn lambda(&self) -> f64 {
        let n = AUG_STATE_DIM as f64;
        self.alpha * self.alpha * (n + self.kappa) - n
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// If false, lidar records are ignored after initialization
    pub use_laser: bool,

    /// If false, radar records are ignored after initialization
    pub use_radar: bool,

    pub process: ProcessNoise,
    pub lidar: LidarNoiseStd,
    pub radar: RadarNoiseStd,
    pub spread: SpreadParams,

    /// Diagonal of the covariance the filter starts tracking with
    pub initial_covariance: [f64; STATE_DIM],
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            use_laser: true,
            use_radar: true,
            process: ProcessNoise::default(),
            lidar: LidarNoiseStd::default(),
            radar: RadarNoiseStd::default(),
            spread: SpreadParams::default(),
            initial_covariance: [1.0; STATE_DIM],
        }
    }
}

impl FilterConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open config {}", path.display()))?;
        let config: FilterConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FilterResult<()> {
        let stds = [
            ("process.std_a", self.process.std_a),
            ("process.std_yawdd", self.process.std_yawdd),
            ("lidar.std_px", self.lidar.std_px),
            ("lidar.std_py", self.lidar.std_py),
            ("radar.std_rho", self.radar.std_rho),
            ("radar.std_phi", self.radar.std_phi),
            ("radar.std_rho_dot", self.radar.std_rho_dot),
        ];
        for (name, value) in stds {
            if !value.is_finite() || value <= 0.0 {
                return Err(FilterError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }

        let spread = &self.spread;
        if !(spread.alpha.is_finite() && spread.beta.is_finite() && spread.kappa.is_finite()) {
            return Err(FilterError::InvalidConfig(
                "spread parameters must be finite".to_string(),
            ));
        }
        // lambda + n_aug scales the sigma points and divides the weights
        let scale = spread.lambda() + AUG_STATE_DIM as f64;
        if scale <= 0.0 {
            return Err(FilterError::InvalidConfig(format!(
                "alpha^2 * (n_aug + kappa) must be positive, got {scale}"
            )));
        }

        if let Some(value) = self
            .initial_covariance
            .iter()
            .find(|v| !v.is_finite() || **v <= 0.0)
        {
            return Err(FilterError::InvalidConfig(format!(
                "initial covariance diagonal must be positive, got {value}"
            )));
        }

        Ok(())
    }

    pub fn lidar_noise(&self) -> LidarNoise {
        LidarNoise::from_diagonal(&nalgebra::Vector2::new(
            self.lidar.std_px.powi(2),
            self.lidar.std_py.powi(2),
        ))
    }

    pub fn radar_noise(&self) -> RadarNoise {
        RadarNoise::from_diagonal(&nalgebra::Vector3::new(
            self.radar.std_rho.powi(2),
            self.radar.std_phi.powi(2),
            self.radar.std_rho_dot.powi(2),
        ))
    }

    pub fn initial_covariance_matrix(&self) -> StateMat {
        StateMat::from_diagonal(&StateVec::from(self.initial_covariance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = FilterConfig::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.spread.lambda(), 1e-6 * 7.0 - 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_noise_matrices_hold_variances() {
        let config = FilterConfig::default();
        let r_lidar = config.lidar_noise();
        assert_relative_eq!(r_lidar[(0, 0)], 0.0225, epsilon = 1e-12);
        assert_relative_eq!(r_lidar[(1, 1)], 0.0225, epsilon = 1e-12);
        assert_eq!(r_lidar[(0, 1)], 0.0);

        let r_radar = config.radar_noise();
        assert_relative_eq!(r_radar[(0, 0)], 0.09, epsilon = 1e-12);
        assert_relative_eq!(r_radar[(1, 1)], 0.0009, epsilon = 1e-12);
        assert_relative_eq!(r_radar[(2, 2)], 0.09, epsilon = 1e-12);

        assert_eq!(config.initial_covariance_matrix(), StateMat::identity());
    }

    #[test]
    fn test_rejects_non_positive_noise() {
        let mut config = FilterConfig::default();
        config.radar.std_phi = 0.0;
        assert!(matches!(
            config.validate(),
            Err(FilterError::InvalidConfig(msg)) if msg.contains("radar.std_phi")
        ));

        let mut config = FilterConfig::default();
        config.process.std_a = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_collapsed_spread() {
        let mut config = FilterConfig::default();
        config.spread.kappa = -(AUG_STATE_DIM as f64);
        assert!(config.validate().is_err());

        let mut config = FilterConfig::default();
        config.initial_covariance[3] = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let json = r#"{ "use_radar": false, "process": { "std_a": 1.5 } }"#;
        let config: FilterConfig = serde_json::from_str(json).unwrap();
        assert!(config.use_laser);
        assert!(!config.use_radar);
        assert_eq!(config.process.std_a, 1.5);
        assert_eq!(config.process.std_yawdd, 0.6);
        assert_eq!(config.spread, SpreadParams::default());
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = FilterConfig::default();
        config.spread.alpha = 0.5;
        config.initial_covariance = [0.5, 0.5, 4.0, 1.0, 1.0];
        let text = serde_json::to_string(&config).unwrap();
        let back: FilterConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
