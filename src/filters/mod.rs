pub mod ctrv;
pub mod lidar;
pub mod radar;
pub mod ukf_ctrv;
pub mod unscented;
