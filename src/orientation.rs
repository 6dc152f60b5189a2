// PostureBand - Orientation Estimator
//
// Collects raw accelerometer readings into a tumbling window of
// ORIENTATION_WINDOW samples. When the window fills, one OrientationSample is
// produced from the averaged vector and the window is cleared.

use std::fmt::Display;

use crate::config::*;
use crate::events::{OrientationSample, RawAccel};

pub struct OrientationEstimator {
    window: [RawAccel; ORIENTATION_WINDOW],
    used: usize,
}

impl Default for OrientationEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrientationEstimator {
    pub fn new() -> Self {
        Self {
            window: [RawAccel::default(); ORIENTATION_WINDOW],
            used: 0,
        }
    }

    /// Number of readings buffered toward the next sample.
    pub fn pending(&self) -> usize {
        self.used
    }

    /// Append one reading. Returns a sample every ORIENTATION_WINDOW calls.
    pub fn push(&mut self, reading: RawAccel) -> Option<OrientationSample> {
        self.window[self.used] = reading;
        self.used += 1;
        if self.used < ORIENTATION_WINDOW {
            return None;
        }

        let (x_angle, y_angle) = average_angles(&self.window);
        let sample = OrientationSample::new(x_angle, y_angle, max_magnitude_jump(&self.window));
        log::debug!(
            "Window: angles ({}, {}), motion {}",
            sample.x_angle,
            sample.y_angle,
            sample.motion_amplitude
        );

        self.used = 0;
        Some(sample)
    }

    /// One sampling cycle. A failed read is logged and the cycle skipped:
    /// nothing is buffered or retried for it.
    pub fn take_reading<E: Display>(
        &mut self,
        reading: Result<RawAccel, E>,
    ) -> Option<OrientationSample> {
        match reading {
            Ok(r) => self.push(r),
            Err(e) => {
                log::warn!("Accelerometer read failed, skipping cycle: {}", e);
                None
            }
        }
    }
}

/// `main = atan2(y, x)`, `side = atan2(z, x)` of the window average, in
/// whole degrees truncated toward zero.
fn average_angles(window: &[RawAccel]) -> (i16, i16) {
    let n = window.len().max(1) as i64;
    let (sx, sy, sz) = window.iter().fold((0i64, 0i64, 0i64), |(x, y, z), r| {
        (x + i64::from(r.x), y + i64::from(r.y), z + i64::from(r.z))
    });
    let (x, y, z) = ((sx / n) as f32, (sy / n) as f32, (sz / n) as f32);

    let main = y.atan2(x).to_degrees();
    let side = z.atan2(x).to_degrees();
    (main as i16, side as i16)
}

/// Jolt proxy: largest absolute difference between magnitudes of adjacent
/// readings.
fn max_magnitude_jump(window: &[RawAccel]) -> u32 {
    window
        .windows(2)
        .map(|pair| pair[0].magnitude().abs_diff(pair[1].magnitude()))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{work_queue, Work};

    fn feed(est: &mut OrientationEstimator, r: RawAccel, n: usize) -> Vec<OrientationSample> {
        (0..n).filter_map(|_| est.push(r)).collect()
    }

    #[test]
    fn emits_once_per_full_window() {
        let mut est = OrientationEstimator::new();
        let still = RawAccel::new(9806, 0, 0);

        for _ in 0..ORIENTATION_WINDOW - 1 {
            assert!(est.push(still).is_none());
        }
        assert_eq!(est.pending(), ORIENTATION_WINDOW - 1);
        assert!(est.push(still).is_some());
        assert_eq!(est.pending(), 0);

        let out = feed(&mut est, still, ORIENTATION_WINDOW * 3);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn level_device_reads_zero_angles() {
        let mut est = OrientationEstimator::new();
        let out = feed(&mut est, RawAccel::new(9806, 0, 0), ORIENTATION_WINDOW);
        assert_eq!(out, vec![OrientationSample::new(0, 0, 0)]);
    }

    #[test]
    fn tilt_truncates_toward_zero() {
        let mut est = OrientationEstimator::new();
        // atan2(5000, 10000) = 26.57 degrees
        let out = feed(&mut est, RawAccel::new(10000, 5000, -5000), ORIENTATION_WINDOW);
        assert_eq!(out[0].x_angle, 26);
        assert_eq!(out[0].y_angle, -26);
    }

    #[test]
    fn single_jolt_is_detected_even_if_average_is_calm() {
        let mut est = OrientationEstimator::new();
        let still = RawAccel::new(9806, 0, 0);
        for _ in 0..5 {
            assert!(est.push(still).is_none());
        }
        assert!(est.push(RawAccel::new(12806, 0, 0)).is_none());
        let out = feed(&mut est, still, 4);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].motion_amplitude, 3000);
        assert_eq!(out[0].x_angle, 0);
    }

    #[test]
    fn windows_do_not_overlap() {
        let mut est = OrientationEstimator::new();
        let jolt = RawAccel::new(20000, 0, 0);
        let still = RawAccel::new(9806, 0, 0);
        let first: Vec<_> = (0..ORIENTATION_WINDOW)
            .filter_map(|i| est.push(if i == ORIENTATION_WINDOW - 1 { jolt } else { still }))
            .collect();
        assert!(first[0].motion_amplitude > MOVEMENT_THRESHOLD);

        let second = feed(&mut est, still, ORIENTATION_WINDOW);
        assert_eq!(second[0].motion_amplitude, 0);
    }

    #[test]
    fn failed_read_skips_the_cycle() {
        let (queue, rx) = work_queue();
        let mut est = OrientationEstimator::new();
        let good = RawAccel::new(9806, 0, 0);

        let mut cycle = |reading: Result<RawAccel, &str>| {
            if let Some(sample) = est.take_reading(reading) {
                queue.submit_sample(sample);
            }
        };
        for _ in 0..5 {
            cycle(Ok(good));
        }
        cycle(Err("i2c timeout"));
        assert!(rx.try_recv().is_none());
        for _ in 0..4 {
            cycle(Ok(good));
        }
        // Nine good readings: still one short of a window.
        assert!(rx.try_recv().is_none());
        cycle(Ok(good));
        assert_eq!(rx.try_recv(), Some(Work::Sample(OrientationSample::new(0, 0, 0))));
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn extreme_readings_do_not_overflow() {
        let mut est = OrientationEstimator::new();
        let out = feed(&mut est, RawAccel::new(i32::MAX, i32::MAX, i32::MIN), ORIENTATION_WINDOW);
        assert_eq!(out.len(), 1);
        assert!((44..=45).contains(&out[0].x_angle));
        assert_eq!(out[0].motion_amplitude, 0);
    }
}
