//! Constant Turn Rate and Velocity process model

use crate::types::{
    AugSigmaPoints, AugStateVec, SigmaPoints, StateVec, NU_A, NU_YAWDD, PX, PY, SIGMA_COUNT,
    SPEED, YAW, YAW_RATE,
};

use super::unscented::normalize_angle;

/// Below this turn rate the arc update divides by ~0 and the straight-line
/// form is used instead [rad/s].
pub const MIN_YAW_RATE: f64 = 1e-4;

/// Propagate one augmented point forward by `dt` seconds.
///
/// Speed and turn rate are held constant between samples; the two noise
/// channels enter as second-order acceleration terms.
pub fn ctrv_transition(point: &AugStateVec, dt: f64) -> StateVec {
    let p_x = point[PX];
    let p_y = point[PY];
    let v = point[SPEED];
    let yaw = point[YAW];
    let yawd = point[YAW_RATE];
    let nu_a = point[NU_A];
    let nu_yawdd = point[NU_YAWDD];

    let (mut px_p, mut py_p) = if yawd.abs() > MIN_YAW_RATE {
        (
            p_x + v / yawd * ((yaw + yawd * dt).sin() - yaw.sin()),
            p_y + v / yawd * (yaw.cos() - (yaw + yawd * dt).cos()),
        )
    } else {
        (p_x + v * dt * yaw.cos(), p_y + v * dt * yaw.sin())
    };
    let mut v_p = v;
    let mut yaw_p = yaw + yawd * dt;
    let mut yawd_p = yawd;

    let dt2 = dt * dt;
    px_p += 0.5 * nu_a * dt2 * yaw.cos();
    py_p += 0.5 * nu_a * dt2 * yaw.sin();
    v_p += nu_a * dt;
    yaw_p += 0.5 * nu_yawdd * dt2;
    yawd_p += nu_yawdd * dt;

    StateVec::new(px_p, py_p, v_p, normalize_angle(yaw_p), yawd_p)
}

/// Run every augmented sigma point through the motion model.
pub fn predict_sigma_points(sigma_aug: &AugSigmaPoints, dt: f64) -> SigmaPoints {
    let mut sigma_pred = SigmaPoints::zeros();
    for i in 0..SIGMA_COUNT {
        let point: AugStateVec = sigma_aug.column(i).into_owned();
        sigma_pred.set_column(i, &ctrv_transition(&point, dt));
    }
    sigma_pred
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn aug(px: f64, py: f64, v: f64, yaw: f64, yawd: f64, nu_a: f64, nu_yawdd: f64) -> AugStateVec {
        AugStateVec::from_column_slice(&[px, py, v, yaw, yawd, nu_a, nu_yawdd])
    }

    #[test]
    fn test_straight_line() {
        let next = ctrv_transition(&aug(1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0), 2.0);
        assert_abs_diff_eq!(next, StateVec::new(7.0, 2.0, 3.0, 0.0, 0.0), epsilon = 1e-12);

        let next = ctrv_transition(&aug(0.0, 0.0, 1.0, FRAC_PI_2, 0.0, 0.0, 0.0), 1.0);
        assert_abs_diff_eq!(next[PX], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(next[PY], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_quarter_turn_on_circle() {
        // radius v / yawd = 2, quarter circle in pi/2 seconds
        let next = ctrv_transition(&aug(0.0, 0.0, 2.0, 0.0, 1.0, 0.0, 0.0), FRAC_PI_2);
        assert_abs_diff_eq!(next[PX], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(next[PY], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(next[YAW], FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(next[SPEED], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(next[YAW_RATE], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_small_turn_rate_matches_straight_line() {
        let dt = 0.1;
        let arc = ctrv_transition(&aug(0.0, 0.0, 5.0, 0.3, 2e-4, 0.0, 0.0), dt);
        let line = ctrv_transition(&aug(0.0, 0.0, 5.0, 0.3, 5e-5, 0.0, 0.0), dt);
        assert_abs_diff_eq!(arc[PX], line[PX], epsilon = 1e-4);
        assert_abs_diff_eq!(arc[PY], line[PY], epsilon = 1e-4);
    }

    #[test]
    fn test_noise_injection() {
        let dt = 0.5;
        let next = ctrv_transition(&aug(0.0, 0.0, 1.0, 0.0, 0.0, 2.0, 4.0), dt);
        assert_abs_diff_eq!(next[PX], 0.5 + 0.5 * 2.0 * 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(next[PY], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(next[SPEED], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(next[YAW], 0.5 * 4.0 * 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(next[YAW_RATE], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_yaw_wraps() {
        let next = ctrv_transition(&aug(0.0, 0.0, 0.0, PI - 0.05, 1.0, 0.0, 0.0), 0.1);
        assert_abs_diff_eq!(next[YAW], -PI + 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_dt_keeps_state() {
        let point = aug(3.0, -1.0, 2.0, 0.7, 0.2, 0.5, -0.3);
        let next = ctrv_transition(&point, 0.0);
        assert_abs_diff_eq!(next, StateVec::new(3.0, -1.0, 2.0, 0.7, 0.2), epsilon = 1e-15);
    }

    #[test]
    fn test_predict_every_column() {
        let mut sigma_aug = AugSigmaPoints::zeros();
        for i in 0..SIGMA_COUNT {
            sigma_aug.set_column(i, &aug(i as f64, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0));
        }
        let sigma_pred = predict_sigma_points(&sigma_aug, 1.0);
        for i in 0..SIGMA_COUNT {
            assert_abs_diff_eq!(sigma_pred[(PX, i)], i as f64 + 1.0, epsilon = 1e-12);
        }
    }
}
