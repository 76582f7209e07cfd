//! Radar measurement update
//!
//! Range/bearing/range-rate is a nonlinear function of the CTRV state, so the
//! predicted sigma points are pushed through it and the update runs on the
//! recovered moments.

use crate::error::{FilterError, FilterResult};
use crate::types::{
    CrossCovRadar, KalmanGainRadar, RadarNoise, RadarSigmaPoints, RadarVec, SigmaPoints,
    StateMat, StateVec, BEARING, PX, PY, SIGMA_COUNT, SPEED, YAW,
};

use super::lidar::Correction;
use super::unscented::{deviation, normalize_angle, recover_moments, symmetrize, UnscentedWeights};

/// |px| below this is treated as zero
pub const PX_EPSILON: f64 = 1e-6;

/// Value px is clamped to when it is treated as zero [m]
pub const PX_CLAMP: f64 = 1e-5;

/// Ranges below this make bearing and range rate meaningless [m]
pub const MIN_RANGE: f64 = 1e-5;

/// Map one state into radar measurement space.
///
/// Only px is guarded: a point on the y axis is clamped just off it. A point
/// at the sensor origin is reported as degenerate.
pub fn measurement_model(point: &StateVec) -> FilterResult<RadarVec> {
    let mut px = point[PX];
    let py = point[PY];
    let v = point[SPEED];
    let yaw = point[YAW];

    if px.abs() < PX_EPSILON {
        px = PX_CLAMP;
    }
    let rho = (px * px + py * py).sqrt();
    if rho < MIN_RANGE {
        return Err(FilterError::DegenerateGeometry { px, py });
    }
    let phi = py.atan2(px);
    let rho_dot = (px * yaw.cos() * v + py * yaw.sin() * v) / rho;

    Ok(RadarVec::new(rho, phi, rho_dot))
}

pub fn measurement_sigma_points(sigma_pred: &SigmaPoints) -> FilterResult<RadarSigmaPoints> {
    let mut z_sig = RadarSigmaPoints::zeros();
    for i in 0..SIGMA_COUNT {
        let point: StateVec = sigma_pred.column(i).into_owned();
        z_sig.set_column(i, &measurement_model(&point)?);
    }
    Ok(z_sig)
}

/// Unscented radar update on the predicted sigma points.
///
/// `x` and `p` are the predicted moments of `sigma_pred`.
pub fn update(
    sigma_pred: &SigmaPoints,
    x: &StateVec,
    p: &StateMat,
    z: &RadarVec,
    r: &RadarNoise,
    weights: &UnscentedWeights,
) -> FilterResult<Correction> {
    let z_sig = measurement_sigma_points(sigma_pred)?;

    let predicted = recover_moments(&z_sig, weights, Some(BEARING));
    let z_pred = predicted.mean;
    let s = predicted.covariance + r;

    let mut tc = CrossCovRadar::zeros();
    for i in 0..SIGMA_COUNT {
        let x_diff = deviation(&sigma_pred.column(i).into_owned(), x, Some(YAW));
        let z_diff = deviation(&z_sig.column(i).into_owned(), &z_pred, Some(BEARING));
        tc += x_diff * z_diff.transpose() * weights.covariance[i];
    }

    let s_chol = s
        .cholesky()
        .ok_or(FilterError::NotPositiveDefinite { stage: "radar innovation" })?;
    // K = Tc S^-1 = (S^-1 Tc^T)^T for symmetric S
    let k: KalmanGainRadar = s_chol.solve(&tc.transpose()).transpose();

    let y = deviation(z, &z_pred, Some(BEARING));
    let nis = y.dot(&s_chol.solve(&y));

    let mut state = x + k * y;
    state[YAW] = normalize_angle(state[YAW]);
    let covariance = symmetrize(&(p - k * s * k.transpose()));

    Ok(Correction {
        state,
        covariance,
        nis,
    })
}
