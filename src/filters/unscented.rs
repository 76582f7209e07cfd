//! Unscented transform primitives shared by prediction and the radar update

use std::f64::consts::{PI, TAU};

use nalgebra::{SMatrix, SVector};

use crate::config::{ProcessNoise, SpreadParams};
use crate::error::{FilterError, FilterResult};
use crate::types::{
    AugSigmaPoints, AugStateMat, AugStateVec, SigmaWeights, StateMat, StateVec, AUG_STATE_DIM,
    NU_A, NU_YAWDD, SIGMA_COUNT, STATE_DIM,
};

/// Wrap an angle into (-pi, pi].
///
/// The result differs from the input by a whole number of turns. Non-finite
/// input is returned as is.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Sigma point weights, fixed at construction
#[derive(Clone, Debug, PartialEq)]
pub struct UnscentedWeights {
    /// Combined scaling parameter
    pub lambda: f64,

    /// lambda + n_aug, the squared spread of the sigma points
    pub scale: f64,

    pub mean: SigmaWeights,
    pub covariance: SigmaWeights,
}

impl UnscentedWeights {
    pub fn new(params: &SpreadParams) -> Self {
        let lambda = params.lambda();
        let scale = lambda + AUG_STATE_DIM as f64;

        let mut mean = SigmaWeights::from_element(0.5 / scale);
        let mut covariance = mean;
        mean[0] = lambda / scale;
        covariance[0] = lambda / scale + (1.0 - params.alpha * params.alpha + params.beta);

        Self {
            lambda,
            scale,
            mean,
            covariance,
        }
    }
}

/// Mean and covariance recovered from a set of sigma points
#[derive(Clone, Debug, PartialEq)]
pub struct Moments<const R: usize> {
    pub mean: SVector<f64, R>,
    pub covariance: SMatrix<f64, R, R>,
}

/// Build the augmented sigma points for the current state.
///
/// The state is padded with the two zero-mean process noise channels and the
/// augmented covariance is factored with a lower Cholesky decomposition.
pub fn augmented_sigma_points(
    x: &StateVec,
    p: &StateMat,
    noise: &ProcessNoise,
    weights: &UnscentedWeights,
) -> FilterResult<AugSigmaPoints> {
    let mut x_aug = AugStateVec::zeros();
    x_aug.fixed_rows_mut::<STATE_DIM>(0).copy_from(x);

    let mut p_aug = AugStateMat::zeros();
    p_aug
        .fixed_view_mut::<STATE_DIM, STATE_DIM>(0, 0)
        .copy_from(p);
    p_aug[(NU_A, NU_A)] = noise.std_a * noise.std_a;
    p_aug[(NU_YAWDD, NU_YAWDD)] = noise.std_yawdd * noise.std_yawdd;

    // Cholesky does not reject NaN on its own
    if !p_aug.iter().all(|v| v.is_finite()) {
        return Err(FilterError::NotPositiveDefinite { stage: "augmented" });
    }
    let l_mat = p_aug
        .cholesky()
        .ok_or(FilterError::NotPositiveDefinite { stage: "augmented" })?
        .l();
    let a_mat = l_mat * weights.scale.sqrt();

    let mut sigma = AugSigmaPoints::zeros();
    sigma.set_column(0, &x_aug);
    for i in 0..AUG_STATE_DIM {
        let offset = a_mat.column(i);
        sigma.set_column(i + 1, &(x_aug + offset));
        sigma.set_column(i + 1 + AUG_STATE_DIM, &(x_aug - offset));
    }

    Ok(sigma)
}

/// Difference between a sigma point and a reference point, with the angular
/// component wrapped.
pub fn deviation<const R: usize>(
    point: &SVector<f64, R>,
    reference: &SVector<f64, R>,
    angle_index: Option<usize>,
) -> SVector<f64, R> {
    let mut diff = point - reference;
    if let Some(idx) = angle_index {
        diff[idx] = normalize_angle(diff[idx]);
    }
    diff
}

/// Recombine sigma points into a weighted mean and covariance.
///
/// The mean is accumulated relative to the centre point. With weights summing
/// to one this equals the plain weighted sum, but it neither folds across the
/// +-pi seam nor cancels against the large negative centre weight of a small
/// alpha.
pub fn recover_moments<const R: usize>(
    points: &SMatrix<f64, R, SIGMA_COUNT>,
    weights: &UnscentedWeights,
    angle_index: Option<usize>,
) -> Moments<R> {
    let anchor: SVector<f64, R> = points.column(0).into_owned();

    let mut mean = anchor;
    for i in 1..SIGMA_COUNT {
        let diff = deviation(&points.column(i).into_owned(), &anchor, angle_index);
        mean += diff * weights.mean[i];
    }
    if let Some(idx) = angle_index {
        mean[idx] = normalize_angle(mean[idx]);
    }

    let mut covariance = SMatrix::<f64, R, R>::zeros();
    for i in 0..SIGMA_COUNT {
        let diff = deviation(&points.column(i).into_owned(), &mean, angle_index);
        covariance += diff * diff.transpose() * weights.covariance[i];
    }

    Moments { mean, covariance }
}

/// Force symmetry of a covariance matrix
pub fn symmetrize<const R: usize>(p: &SMatrix<f64, R, R>) -> SMatrix<f64, R, R> {
    (p + p.transpose()) * 0.5
}
