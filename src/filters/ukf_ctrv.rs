use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;
use crate::error::{FilterError, FilterResult};
use crate::types::{
    MeasurementPackage, RawMeasurement, SensorType, SigmaPoints, StateMat, StateVec, PX, PY,
    SPEED, YAW, YAW_RATE,
};

use super::ctrv::predict_sigma_points;
use super::lidar::{self, Correction};
use super::radar;
use super::unscented::{augmented_sigma_points, recover_moments, symmetrize, UnscentedWeights};

/// Snapshot of the filter for logging and scoring
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UkfCtrvState {
    /// Timestamp of the last processed record [microseconds]
    pub timestamp: Option<i64>,

    /// Position in the sensor frame [meters]
    pub position: (f64, f64),

    /// Speed magnitude [m/s]
    pub speed: f64,

    /// Heading [rad], in (-pi, pi]
    pub yaw: f64,

    /// Heading rate [rad/s]
    pub yaw_rate: f64,

    /// Cartesian velocity derived from speed and heading [m/s]
    pub velocity: (f64, f64),

    /// Covariance trace for uncertainty
    pub covariance_trace: f64,

    /// Last normalised innovation squared per sensor
    pub nis_lidar: Option<f64>,
    pub nis_radar: Option<f64>,

    /// Update counters
    pub lidar_updates: u64,
    pub radar_updates: u64,
    pub skipped_updates: u64,
}

/// Where the filter is in its lifecycle. Prediction needs the previous
/// record, which only exists once tracking has started.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackPhase {
    Uninitialized,
    Tracking { last: MeasurementPackage },
}

/// What a call to [`CtrvUkf::process_measurement`] did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// First record seeded the state; nothing was predicted
    Initialized,
    /// Predicted and corrected with this sensor
    Updated(SensorType),
    /// Predicted only; the sensor is disabled
    Ignored(SensorType),
    /// Predicted only; the update hit degenerate geometry and was dropped
    Skipped(SensorType),
}

/// Unscented Kalman filter over the CTRV state (px, py, v, yaw, yaw_rate)
pub struct CtrvUkf {
    config: FilterConfig,
    weights: UnscentedWeights,

    /// State vector [5D]
    state: StateVec,

    /// Covariance matrix [5x5]
    covariance: StateMat,

    /// Predicted sigma points from the last prediction [5x15]
    sigma_pred: SigmaPoints,

    phase: TrackPhase,

    nis_lidar: Option<f64>,
    nis_radar: Option<f64>,

    /// Update counters
    lidar_updates: u64,
    radar_updates: u64,
    skipped_updates: u64,
}

impl CtrvUkf {
    pub fn new(config: FilterConfig) -> FilterResult<Self> {
        config.validate()?;
        let weights = UnscentedWeights::new(&config.spread);
        let covariance = config.initial_covariance_matrix();

        Ok(Self {
            config,
            weights,
            state: StateVec::zeros(),
            covariance,
            sigma_pred: SigmaPoints::zeros(),
            phase: TrackPhase::Uninitialized,
            nis_lidar: None,
            nis_radar: None,
            lidar_updates: 0,
            radar_updates: 0,
            skipped_updates: 0,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn weights(&self) -> &UnscentedWeights {
        &self.weights
    }

    pub fn state(&self) -> &StateVec {
        &self.state
    }

    pub fn covariance(&self) -> &StateMat {
        &self.covariance
    }

    pub fn predicted_sigma_points(&self) -> &SigmaPoints {
        &self.sigma_pred
    }

    pub fn phase(&self) -> &TrackPhase {
        &self.phase
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.phase, TrackPhase::Tracking { .. })
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        match &self.phase {
            TrackPhase::Uninitialized => None,
            TrackPhase::Tracking { last } => Some(last.timestamp),
        }
    }

    pub fn nis_lidar(&self) -> Option<f64> {
        self.nis_lidar
    }

    pub fn nis_radar(&self) -> Option<f64> {
        self.nis_radar
    }

    /// Get current state
    pub fn get_state(&self) -> UkfCtrvState {
        let speed = self.state[SPEED];
        let yaw = self.state[YAW];
        UkfCtrvState {
            timestamp: self.last_timestamp(),
            position: (self.state[PX], self.state[PY]),
            speed,
            yaw,
            yaw_rate: self.state[YAW_RATE],
            velocity: (speed * yaw.cos(), speed * yaw.sin()),
            covariance_trace: self.covariance.trace(),
            nis_lidar: self.nis_lidar,
            nis_radar: self.nis_radar,
            lidar_updates: self.lidar_updates,
            radar_updates: self.radar_updates,
            skipped_updates: self.skipped_updates,
        }
    }

    /// Set state manually (for testing/re-initialization). The phase is kept.
    pub fn set_state(&mut self, state: StateVec, covariance: StateMat) {
        self.state = state;
        self.covariance = covariance;
    }

    /// Drop the track; the next record initializes again.
    pub fn reset(&mut self) {
        self.state = StateVec::zeros();
        self.covariance = self.config.initial_covariance_matrix();
        self.sigma_pred = SigmaPoints::zeros();
        self.phase = TrackPhase::Uninitialized;
        self.nis_lidar = None;
        self.nis_radar = None;
    }

    /// Feed one record through the filter.
    ///
    /// The first record seeds the state. Every later record predicts to its
    /// timestamp and, if its sensor is enabled, corrects with it. A fatal error
    /// leaves state, covariance and bookkeeping untouched.
    pub fn process_measurement(
        &mut self,
        measurement: &MeasurementPackage,
    ) -> FilterResult<StepOutcome> {
        let last_timestamp = match &self.phase {
            TrackPhase::Uninitialized => {
                self.initialize(measurement);
                return Ok(StepOutcome::Initialized);
            }
            TrackPhase::Tracking { last } => last.timestamp,
        };

        let dt = (measurement.timestamp - last_timestamp) as f64 / 1_000_000.0;
        self.predict(dt)?;

        let sensor = measurement.sensor_type();
        let outcome = match sensor {
            SensorType::Laser if self.config.use_laser => {
                self.update_lidar(measurement)?;
                StepOutcome::Updated(sensor)
            }
            SensorType::Radar if self.config.use_radar => match self.update_radar(measurement) {
                Ok(()) => StepOutcome::Updated(sensor),
                Err(FilterError::DegenerateGeometry { px, py }) => {
                    log::warn!(
                        "Skipping radar update at t={}: sigma point at sensor origin (px={px:e}, py={py:e})",
                        measurement.timestamp
                    );
                    self.skipped_updates += 1;
                    StepOutcome::Skipped(sensor)
                }
                Err(e) => return Err(e),
            },
            _ => StepOutcome::Ignored(sensor),
        };

        self.phase = TrackPhase::Tracking { last: *measurement };
        Ok(outcome)
    }

    fn initialize(&mut self, measurement: &MeasurementPackage) {
        self.state = match measurement.raw {
            RawMeasurement::Laser { px, py } => StateVec::new(px, py, 0.0, 0.0, 0.0),
            RawMeasurement::Radar { rho, phi, .. } => {
                StateVec::new(rho * phi.cos(), rho * phi.sin(), 0.0, 0.0, 0.0)
            }
        };
        log::debug!(
            "Initialized from {} at t={}: px={:.3}, py={:.3}",
            measurement.sensor_type(),
            measurement.timestamp,
            self.state[PX],
            self.state[PY]
        );
        self.phase = TrackPhase::Tracking { last: *measurement };
    }

    /// Predict step: propagate through the CTRV model using the unscented transform
    pub fn predict(&mut self, dt: f64) -> FilterResult<()> {
        // 1. Generate augmented sigma points
        let sigma_aug = augmented_sigma_points(
            &self.state,
            &self.covariance,
            &self.config.process,
            &self.weights,
        )
        .map_err(|e| {
            log::error!("Prediction aborted (dt={dt:.6}s): {e}");
            e
        })?;

        // 2. Propagate through motion model
        let sigma_pred = predict_sigma_points(&sigma_aug, dt);

        // 3. Recombine (unscented transform)
        let moments = recover_moments(&sigma_pred, &self.weights, Some(YAW));

        // 4. Update state and covariance
        self.sigma_pred = sigma_pred;
        self.state = moments.mean;
        self.covariance = symmetrize(&moments.covariance);

        log::trace!(
            "Predicted dt={dt:.6}s: x={:?}, trace(P)={:.4}",
            self.state.as_slice(),
            self.covariance.trace()
        );
        Ok(())
    }

    /// Update with a lidar record
    pub fn update_lidar(&mut self, measurement: &MeasurementPackage) -> FilterResult<()> {
        let z = measurement
            .raw
            .as_lidar()
            .ok_or(FilterError::SensorMismatch {
                expected: SensorType::Laser,
                found: measurement.sensor_type(),
            })?;

        let correction =
            lidar::update(&self.state, &self.covariance, &z, &self.config.lidar_noise())?;
        self.nis_lidar = Some(correction.nis);
        self.lidar_updates += 1;
        self.apply(correction, SensorType::Laser);
        Ok(())
    }

    /// Update with a radar record, using the sigma points of the last prediction
    pub fn update_radar(&mut self, measurement: &MeasurementPackage) -> FilterResult<()> {
        let z = measurement
            .raw
            .as_radar()
            .ok_or(FilterError::SensorMismatch {
                expected: SensorType::Radar,
                found: measurement.sensor_type(),
            })?;

        let correction = radar::update(
            &self.sigma_pred,
            &self.state,
            &self.covariance,
            &z,
            &self.config.radar_noise(),
            &self.weights,
        )?;
        self.nis_radar = Some(correction.nis);
        self.radar_updates += 1;
        self.apply(correction, SensorType::Radar);
        Ok(())
    }

    fn apply(&mut self, correction: Correction, sensor: SensorType) {
        log::debug!(
            "{sensor} update: NIS={:.3}, trace(P)={:.4}",
            correction.nis,
            correction.covariance.trace()
        );
        self.state = correction.state;
        self.covariance = correction.covariance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn default_filter() -> CtrvUkf {
        CtrvUkf::new(FilterConfig::default()).unwrap()
    }

    #[test]
    fn test_first_laser_initializes() {
        let mut ukf = default_filter();
        assert!(!ukf.is_initialized());
        assert_eq!(ukf.last_timestamp(), None);

        let outcome = ukf
            .process_measurement(&MeasurementPackage::laser(1_000, 1.0, 2.0))
            .unwrap();
        assert_eq!(outcome, StepOutcome::Initialized);
        assert!(ukf.is_initialized());
        assert_eq!(*ukf.state(), StateVec::new(1.0, 2.0, 0.0, 0.0, 0.0));
        assert_eq!(*ukf.covariance(), StateMat::identity());
        assert_eq!(ukf.last_timestamp(), Some(1_000));
    }

    #[test]
    fn test_first_radar_initializes_in_cartesian() {
        let mut ukf = default_filter();
        ukf.process_measurement(&MeasurementPackage::radar(0, 5.0, 0.0, 0.0))
            .unwrap();
        assert_abs_diff_eq!(
            *ukf.state(),
            StateVec::new(5.0, 0.0, 0.0, 0.0, 0.0),
            epsilon = 1e-12
        );

        let mut ukf = default_filter();
        ukf.process_measurement(&MeasurementPackage::radar(0, 2.0, std::f64::consts::FRAC_PI_2, 3.0))
            .unwrap();
        assert_abs_diff_eq!(
            *ukf.state(),
            StateVec::new(0.0, 2.0, 0.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_initialization_ignores_enable_flags() {
        let config = FilterConfig {
            use_laser: false,
            ..FilterConfig::default()
        };
        let mut ukf = CtrvUkf::new(config).unwrap();
        ukf.process_measurement(&MeasurementPackage::laser(0, 3.0, 4.0))
            .unwrap();
        assert_eq!(ukf.state()[PX], 3.0);
        assert!(ukf.is_initialized());
    }

    #[test]
    fn test_two_laser_records_build_speed() {
        let mut ukf = default_filter();
        let initial_trace = ukf.covariance().trace();
        ukf.process_measurement(&MeasurementPackage::laser(0, 0.0, 0.0))
            .unwrap();
        let outcome = ukf
            .process_measurement(&MeasurementPackage::laser(1_000_000, 1.0, 0.0))
            .unwrap();

        assert_eq!(outcome, StepOutcome::Updated(SensorType::Laser));
        assert!(ukf.state()[SPEED] > 0.0);
        assert!(ukf.covariance().trace() < initial_trace);
        assert!(ukf.nis_lidar().is_some());
        assert_eq!(ukf.get_state().lidar_updates, 1);
    }

    #[test]
    fn test_zero_dt_prediction_is_identity() {
        let mut ukf = default_filter();
        ukf.process_measurement(&MeasurementPackage::laser(0, 0.0, 0.0))
            .unwrap();
        let x = StateVec::new(2.0, -3.0, 4.0, 0.8, 0.3);
        let mut p = StateMat::identity() * 0.5;
        p[(0, 2)] = 0.1;
        p[(2, 0)] = 0.1;
        ukf.set_state(x, p);

        ukf.predict(0.0).unwrap();
        assert_abs_diff_eq!(*ukf.state(), x, epsilon = 1e-8);
        assert_abs_diff_eq!(*ukf.covariance(), p, epsilon = 1e-8);
    }

    #[test]
    fn test_prediction_moves_along_heading() {
        let mut ukf = default_filter();
        ukf.process_measurement(&MeasurementPackage::laser(0, 0.0, 0.0))
            .unwrap();
        ukf.set_state(
            StateVec::new(0.0, 0.0, 2.0, 0.0, 0.0),
            StateMat::identity() * 0.01,
        );
        ukf.predict(0.5).unwrap();
        // heading spread shortens the mean displacement slightly
        assert_abs_diff_eq!(ukf.state()[PX], 1.0, epsilon = 0.02);
        assert_abs_diff_eq!(ukf.state()[PY], 0.0, epsilon = 1e-6);
        assert!(ukf.covariance().trace() > 0.05);
    }

    #[test]
    fn test_disabled_sensor_is_ignored_after_init() {
        let config = FilterConfig {
            use_radar: false,
            ..FilterConfig::default()
        };
        let mut ukf = CtrvUkf::new(config).unwrap();
        ukf.process_measurement(&MeasurementPackage::laser(0, 1.0, 1.0))
            .unwrap();
        let outcome = ukf
            .process_measurement(&MeasurementPackage::radar(100_000, 50.0, 1.0, 3.0))
            .unwrap();

        assert_eq!(outcome, StepOutcome::Ignored(SensorType::Radar));
        assert_eq!(ukf.nis_radar(), None);
        // predicted only: the radar range of 50 m never reached the state
        assert_abs_diff_eq!(ukf.state()[PX], 1.0, epsilon = 1e-6);
        assert_eq!(ukf.last_timestamp(), Some(100_000));
    }

    #[test]
    fn test_sensor_mismatch_leaves_state() {
        let mut ukf = default_filter();
        ukf.process_measurement(&MeasurementPackage::laser(0, 1.0, 1.0))
            .unwrap();
        let before = *ukf.state();

        let err = ukf
            .update_radar(&MeasurementPackage::laser(0, 9.0, 9.0))
            .unwrap_err();
        assert_eq!(
            err,
            FilterError::SensorMismatch {
                expected: SensorType::Radar,
                found: SensorType::Laser,
            }
        );
        assert!(ukf
            .update_lidar(&MeasurementPackage::radar(0, 1.0, 0.0, 0.0))
            .is_err());
        assert_eq!(*ukf.state(), before);
    }

    #[test]
    fn test_broken_covariance_is_fatal_and_leaves_state() {
        let mut ukf = default_filter();
        ukf.process_measurement(&MeasurementPackage::laser(0, 1.0, 1.0))
            .unwrap();
        let x = StateVec::new(1.0, 1.0, 1.0, 0.0, 0.0);
        let mut p = StateMat::identity();
        p[(1, 1)] = -4.0;
        ukf.set_state(x, p);

        let err = ukf
            .process_measurement(&MeasurementPackage::laser(50_000, 1.1, 1.0))
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, FilterError::NotPositiveDefinite { .. }));
        assert_eq!(*ukf.state(), x);
        assert_eq!(*ukf.covariance(), p);
        assert_eq!(ukf.last_timestamp(), Some(0));

        // reset recovers the filter
        ukf.reset();
        assert!(!ukf.is_initialized());
        assert_eq!(
            ukf.process_measurement(&MeasurementPackage::laser(60_000, 1.0, 1.0)),
            Ok(StepOutcome::Initialized)
        );
    }

    #[test]
    fn test_radar_on_y_axis_stays_finite() {
        let mut ukf = default_filter();
        ukf.process_measurement(&MeasurementPackage::laser(0, 1e-9, 5.0))
            .unwrap();
        let outcome = ukf
            .process_measurement(&MeasurementPackage::radar(
                50_000,
                5.0,
                std::f64::consts::FRAC_PI_2,
                0.0,
            ))
            .unwrap();
        assert_eq!(outcome, StepOutcome::Updated(SensorType::Radar));
        assert!(ukf.state().iter().all(|v| v.is_finite()));
        assert!(ukf.covariance().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_radar_at_origin_is_skipped() {
        let mut ukf = default_filter();
        ukf.process_measurement(&MeasurementPackage::laser(0, 0.0, 0.0))
            .unwrap();
        ukf.set_state(
            StateVec::new(5e-6, 0.0, 0.0, 0.0, 0.0),
            StateMat::identity() * 1e-24,
        );

        let outcome = ukf
            .process_measurement(&MeasurementPackage::radar(0, 1.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(outcome, StepOutcome::Skipped(SensorType::Radar));

        // state stays at the predicted values
        let predicted = ukf.predicted_sigma_points().column(0).into_owned();
        assert_abs_diff_eq!(*ukf.state(), predicted, epsilon = 1e-12);
        assert_eq!(ukf.nis_radar(), None);
        assert_eq!(ukf.get_state().skipped_updates, 1);

        // the next usable record is processed normally
        ukf.set_state(StateVec::new(5.0, 0.0, 0.0, 0.0, 0.0), StateMat::identity());
        let outcome = ukf
            .process_measurement(&MeasurementPackage::radar(50_000, 5.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(outcome, StepOutcome::Updated(SensorType::Radar));
    }

    #[test]
    fn test_radar_only_converges_on_turning_target() {
        // circle of radius v / yaw_rate = 50 m around (10, 55)
        let (v, yaw_rate) = (5.0, 0.1);
        let truth = |t: f64| {
            let yaw = yaw_rate * t;
            StateVec::new(
                10.0 + v / yaw_rate * yaw.sin(),
                5.0 + v / yaw_rate * (1.0 - yaw.cos()),
                v,
                yaw,
                yaw_rate,
            )
        };
        let measure = |t: f64| {
            let x = truth(t);
            let rho = (x[PX] * x[PX] + x[PY] * x[PY]).sqrt();
            let phi = x[PY].atan2(x[PX]);
            let rho_dot = (x[PX] * x[YAW].cos() * v + x[PY] * x[YAW].sin() * v) / rho;
            (rho, phi, rho_dot)
        };

        let mut ukf = default_filter();
        let dt_us = 50_000;
        for k in 0..=400 {
            let t = k as f64 * dt_us as f64 / 1e6;
            let (rho, phi, rho_dot) = measure(t);
            ukf.process_measurement(&MeasurementPackage::radar(k * dt_us, rho, phi, rho_dot))
                .unwrap();
        }

        let expected = truth(20.0);
        let x = ukf.state();
        assert_abs_diff_eq!(x[PX], expected[PX], epsilon = 1.0);
        assert_abs_diff_eq!(x[PY], expected[PY], epsilon = 1.0);
        assert_abs_diff_eq!(x[SPEED], expected[SPEED], epsilon = 0.5);
        assert_abs_diff_eq!(x[YAW], expected[YAW], epsilon = 0.2);
        assert_abs_diff_eq!(x[YAW_RATE], expected[YAW_RATE], epsilon = 0.1);
        assert_eq!(ukf.get_state().radar_updates, 400);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut ukf = default_filter();
        ukf.process_measurement(&MeasurementPackage::laser(0, 3.0, 0.0))
            .unwrap();
        ukf.set_state(StateVec::new(3.0, 0.0, 2.0, 0.0, 0.0), StateMat::identity());
        let snapshot = ukf.get_state();
        assert_relative_eq!(snapshot.velocity.0, 2.0);
        assert_relative_eq!(snapshot.covariance_trace, 5.0);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["timestamp"], 0);
        assert_eq!(json["position"][0], 3.0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = FilterConfig::default();
        config.lidar.std_px = -1.0;
        assert!(matches!(
            CtrvUkf::new(config),
            Err(FilterError::InvalidConfig(_))
        ));
    }
}
