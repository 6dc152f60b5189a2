pub mod haptic;
pub mod imu;
pub mod nvs;
pub mod radio;
