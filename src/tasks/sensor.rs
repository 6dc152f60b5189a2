// PostureBand - Sensor Task
//
// Reads the accelerometer every 50 ms, folds readings into orientation
// samples and submits each one to the worker. A sample is dropped while the
// previous one is still queued.

use std::thread;
use std::time::{Duration, Instant};

use postureband::config::*;
use postureband::{OrientationEstimator, WorkQueue};

use crate::drivers::imu::{Mpu6050, SharedBus};

pub fn sensor_task(bus: SharedBus, queue: WorkQueue) {
    log::info!("Sensor task started");

    let imu = Mpu6050::new(bus);
    if let Err(e) = imu.init() {
        log::error!("MPU6050 init failed in sensor task: {}", e);
        return;
    }

    let mut estimator = OrientationEstimator::new();
    let interval = Duration::from_millis(SENSOR_SAMPLE_INTERVAL_MS);

    loop {
        let tick_start = Instant::now();

        if let Some(sample) = estimator.take_reading(imu.read_accel()) {
            log::debug!(
                "Orientation x={} y={} motion={}",
                sample.x_angle,
                sample.y_angle,
                sample.motion_amplitude
            );
            queue.submit_sample(sample);
        }

        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
}
