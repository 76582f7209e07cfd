//! Lidar measurement update
//!
//! Lidar observes position directly, so the measurement model is linear and
//! the classic Kalman equations apply without any sigma points.

use crate::error::{FilterError, FilterResult};
use crate::types::{
    JacobianLidar, KalmanGainLidar, LidarNoise, LidarVec, StateMat, StateVec,
};

use super::unscented::symmetrize;

/// Posterior of a measurement update
#[derive(Clone, Debug, PartialEq)]
pub struct Correction {
    pub state: StateVec,
    pub covariance: StateMat,

    /// Normalised innovation squared
    pub nis: f64,
}

/// H selects (px, py) from the state
pub fn measurement_matrix() -> JacobianLidar {
    JacobianLidar::new(
        1.0, 0.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, 0.0,
    )
}

pub fn update(
    x: &StateVec,
    p: &StateMat,
    z: &LidarVec,
    r: &LidarNoise,
) -> FilterResult<Correction> {
    let h = measurement_matrix();
    let y = z - h * x;
    let s = h * p * h.transpose() + r;

    let s_chol = s
        .cholesky()
        .ok_or(FilterError::NotPositiveDefinite { stage: "lidar innovation" })?;
    // K = P H^T S^-1 = (S^-1 H P)^T for symmetric P and S
    let k: KalmanGainLidar = s_chol.solve(&(h * p)).transpose();
    let nis = y.dot(&s_chol.solve(&y));

    let state = x + k * y;
    let covariance = symmetrize(&((StateMat::identity() - k * h) * p));

    Ok(Correction {
        state,
        covariance,
        nis,
    })
}
