//! Accuracy and consistency scoring for replayed logs

use serde::Serialize;

use crate::types::{GroundTruth, SensorType, StateVec, PX, PY, SPEED, YAW};

/// 95% quantile of chi-squared with 2 degrees of freedom (lidar)
pub const CHI2_95_LIDAR: f64 = 5.991;

/// 95% quantile of chi-squared with 3 degrees of freedom (radar)
pub const CHI2_95_RADAR: f64 = 7.815;

/// Estimate in the same (px, py, vx, vy) frame as the ground truth
pub fn cartesian_estimate(x: &StateVec) -> [f64; 4] {
    let v = x[SPEED];
    let yaw = x[YAW];
    [x[PX], x[PY], v * yaw.cos(), v * yaw.sin()]
}

/// Running root-mean-square error over (px, py, vx, vy)
#[derive(Clone, Debug, Default)]
pub struct Rmse {
    sum_sq: [f64; 4],
    count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RmseReport {
    pub px: f64,
    pub py: f64,
    pub vx: f64,
    pub vy: f64,
    pub samples: usize,
}

impl Rmse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, estimate: &StateVec, truth: &GroundTruth) {
        let est = cartesian_estimate(estimate);
        let gt = [truth.px, truth.py, truth.vx, truth.vy];
        for ((acc, e), t) in self.sum_sq.iter_mut().zip(est).zip(gt) {
            *acc += (e - t).powi(2);
        }
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// `None` until at least one sample was pushed
    pub fn report(&self) -> Option<RmseReport> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let [px, py, vx, vy] = self.sum_sq.map(|s| (s / n).sqrt());
        Some(RmseReport {
            px,
            py,
            vx,
            vy,
            samples: self.count,
        })
    }
}

/// NIS samples for one sensor, checked against its chi-squared 95% bound
#[derive(Clone, Debug, Serialize)]
pub struct NisStats {
    pub sensor: SensorType,
    pub bound: f64,
    pub samples: usize,
    pub above_bound: usize,
    pub mean: f64,
}

impl NisStats {
    pub fn new(sensor: SensorType) -> Self {
        let bound = match sensor {
            SensorType::Laser => CHI2_95_LIDAR,
            SensorType::Radar => CHI2_95_RADAR,
        };
        Self {
            sensor,
            bound,
            samples: 0,
            above_bound: 0,
            mean: 0.0,
        }
    }

    pub fn push(&mut self, nis: f64) {
        self.samples += 1;
        if nis > self.bound {
            self.above_bound += 1;
        }
        self.mean += (nis - self.mean) / self.samples as f64;
    }

    /// Fraction of samples above the bound; about 0.05 for a consistent filter
    pub fn fraction_above(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.above_bound as f64 / self.samples as f64)
    }
}
