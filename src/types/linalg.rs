//! Linear algebra type system for the CTRV tracker
//!
//! Provides compile-time dimension checking and clean type aliases
//! for the unscented filter and both sensor updates.

use nalgebra::{SMatrix, SVector};

// ===== State Dimensions =====
pub const STATE_DIM: usize = 5; // (px, py, v, yaw, yaw_rate)
pub const AUG_STATE_DIM: usize = STATE_DIM + 2; // + (nu_a, nu_yawdd)

// ===== Measurement Dimensions =====
pub const MEASURE_DIM_LIDAR: usize = 2; // (px, py)
pub const MEASURE_DIM_RADAR: usize = 3; // (rho, phi, rho_dot)

// ===== State Indices =====
pub const PX: usize = 0;
pub const PY: usize = 1;
pub const SPEED: usize = 2;
pub const YAW: usize = 3;
pub const YAW_RATE: usize = 4;
pub const NU_A: usize = 5;
pub const NU_YAWDD: usize = 6;

// ===== Radar Measurement Indices =====
pub const RANGE: usize = 0;
pub const BEARING: usize = 1;
pub const RANGE_RATE: usize = 2;

// ===== State Types =====
pub type StateVec = SVector<f64, STATE_DIM>;
pub type StateMat = SMatrix<f64, STATE_DIM, STATE_DIM>;
pub type AugStateVec = SVector<f64, AUG_STATE_DIM>;
pub type AugStateMat = SMatrix<f64, AUG_STATE_DIM, AUG_STATE_DIM>;

// ===== Sigma Point Types =====
pub const SIGMA_COUNT: usize = 2 * AUG_STATE_DIM + 1; // 15
pub type AugSigmaPoints = SMatrix<f64, AUG_STATE_DIM, SIGMA_COUNT>; // 7×15
pub type SigmaPoints = SMatrix<f64, STATE_DIM, SIGMA_COUNT>; // 5×15
pub type SigmaWeights = SVector<f64, SIGMA_COUNT>;

// ===== Lidar Types =====
pub type LidarVec = SVector<f64, MEASURE_DIM_LIDAR>;
pub type LidarNoise = SMatrix<f64, MEASURE_DIM_LIDAR, MEASURE_DIM_LIDAR>;
pub type JacobianLidar = SMatrix<f64, MEASURE_DIM_LIDAR, STATE_DIM>; // 2×5
pub type KalmanGainLidar = SMatrix<f64, STATE_DIM, MEASURE_DIM_LIDAR>; // 5×2

// ===== Radar Types =====
pub type RadarVec = SVector<f64, MEASURE_DIM_RADAR>;
pub type RadarNoise = SMatrix<f64, MEASURE_DIM_RADAR, MEASURE_DIM_RADAR>;
pub type RadarSigmaPoints = SMatrix<f64, MEASURE_DIM_RADAR, SIGMA_COUNT>; // 3×15
pub type CrossCovRadar = SMatrix<f64, STATE_DIM, MEASURE_DIM_RADAR>; // 5×3
pub type KalmanGainRadar = SMatrix<f64, STATE_DIM, MEASURE_DIM_RADAR>; // 5×3
