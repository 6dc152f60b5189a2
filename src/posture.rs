// PostureBand - Posture Detection
//
// Classifies each OrientationSample into a PostureState with per-state
// hysteresis, tracks dwell time for telemetry, drives the haptic motor and
// reports alerts for the protocol layer.
//
// Evaluation order per sample:
//   1. classify (movement > plausibility > correctness)
//   2. one-shot calibration capture, mute override
//   3. inactivity reminder
//   4. periodic telemetry flush
//   5. sustained-incorrect feedback or state transition

use std::time::Duration;

use crate::config::*;
use crate::error::StoreError;
use crate::events::{Alert, OrientationSample, PostureState};
use crate::hal::Haptic;
use crate::telemetry::{TelemetryRecord, TelemetrySink};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostureSettings {
    /// Seconds of incorrect posture before feedback starts.
    pub detection_time: u8,
    /// Half-width of the correct band, degrees.
    pub detection_range: u8,
    pub is_notifying: bool,
    /// Centre of the correct band on the X axis, degrees.
    pub x_angle_calibration: i8,
}

impl Default for PostureSettings {
    fn default() -> Self {
        Self {
            detection_time: DEFAULT_DETECTION_TIME_S,
            detection_range: DEFAULT_DETECTION_RANGE_DEG,
            is_notifying: true,
            x_angle_calibration: DEFAULT_X_CALIBRATION_DEG,
        }
    }
}

impl PostureSettings {
    pub const SIZE: usize = 4;

    /// Field order, one byte each.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [
            self.detection_time,
            self.detection_range,
            self.is_notifying as u8,
            self.x_angle_calibration as u8,
        ]
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self, StoreError> {
        match *b {
            [time, range, notifying, calibration] => Ok(Self {
                detection_time: time,
                detection_range: range,
                is_notifying: notifying != 0,
                x_angle_calibration: calibration as i8,
            }),
            _ => Err(StoreError::BadLength(b.len())),
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Degrees added to the region of `target` when evaluating a sample while in
/// `current`. Staying in a state is easier than entering it.
pub fn hysteresis(current: PostureState, target: PostureState) -> i16 {
    if current == target {
        HYSTERESIS_DEG
    } else {
        -HYSTERESIS_DEG
    }
}

/// Candidate state for `sample`, given the state the detector is in now.
pub fn classify(
    sample: &OrientationSample,
    current: PostureState,
    settings: &PostureSettings,
) -> PostureState {
    if sample.motion_amplitude > MOVEMENT_THRESHOLD {
        return PostureState::Movements;
    }

    let x = i32::from(sample.x_angle);
    let y = i32::from(sample.y_angle);

    let limit = i32::from(VALID_ANGLE_LIMIT - hysteresis(current, PostureState::Invalid));
    if x.abs() >= limit || y.abs() >= limit {
        return PostureState::Invalid;
    }

    let band = i32::from(settings.detection_range)
        + i32::from(hysteresis(current, PostureState::Correct));
    let dx = (x - i32::from(settings.x_angle_calibration)).abs();
    if dx >= band || y.abs() >= band {
        PostureState::Incorrect
    } else {
        PostureState::Correct
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy)]
pub struct DetectorTiming {
    pub flush_interval_s: u32,
    pub inactivity_reminder_s: u32,
    pub reminder_pulse: Duration,
}

impl Default for DetectorTiming {
    fn default() -> Self {
        Self {
            flush_interval_s: TELEMETRY_FLUSH_INTERVAL_S,
            inactivity_reminder_s: INACTIVITY_REMINDER_S,
            reminder_pulse: Duration::from_millis(HAPTIC_PULSE_MS),
        }
    }
}

pub struct PostureDetector {
    settings: PostureSettings,
    timing: DetectorTiming,
    state: PostureState,
    /// When the current state was entered.
    entered_ms: u64,
    /// Dwell time before this point is already in `record`.
    accrued_ms: u64,
    reminder_ms: u64,
    flush_ms: u64,
    is_vibrating: bool,
    calibration_pending: bool,
    record: TelemetryRecord,
}

fn elapsed_s(now_ms: u64, since_ms: u64) -> u64 {
    now_ms.saturating_sub(since_ms) / 1000
}

impl PostureDetector {
    pub fn new(settings: PostureSettings, timing: DetectorTiming, now_ms: u64) -> Self {
        Self {
            settings,
            timing,
            state: PostureState::default(),
            entered_ms: now_ms,
            accrued_ms: now_ms,
            reminder_ms: now_ms,
            flush_ms: now_ms,
            is_vibrating: false,
            calibration_pending: false,
            record: TelemetryRecord::default(),
        }
    }

    pub fn state(&self) -> PostureState {
        self.state
    }

    pub fn settings(&self) -> PostureSettings {
        self.settings
    }

    /// Telemetry accumulated since the last successful flush.
    pub fn record(&self) -> &TelemetryRecord {
        &self.record
    }

    pub fn is_vibrating(&self) -> bool {
        self.is_vibrating
    }

    pub fn calibration_pending(&self) -> bool {
        self.calibration_pending
    }

    // ---- Settings mutation (protocol commands) ----------------------------

    pub fn set_timeout(&mut self, seconds: u8) {
        self.settings.detection_time = seconds;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.is_notifying = enabled;
    }

    pub fn set_range(&mut self, degrees: u8) {
        self.settings.detection_range = degrees;
    }

    /// Capture the X angle of the next `Correct` sample as the new centre.
    pub fn request_calibration(&mut self) {
        self.calibration_pending = true;
    }

    // ---- Per-sample step ---------------------------------------------------

    pub fn update(
        &mut self,
        sample: &OrientationSample,
        now_ms: u64,
        haptic: &mut dyn Haptic,
        sink: &mut dyn TelemetrySink,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        let mut wanted = classify(sample, self.state, &self.settings);

        if self.calibration_pending && wanted == PostureState::Correct {
            let captured = sample.x_angle.clamp(i8::MIN as i16, i8::MAX as i16) as i8;
            log::info!("Calibration captured: {} deg", captured);
            self.settings.x_angle_calibration = captured;
            self.calibration_pending = false;
            alerts.push(Alert::Calibrated(self.settings));
        }

        if !self.settings.is_notifying && wanted != PostureState::Movements {
            wanted = PostureState::Invalid;
        }

        if self.state != PostureState::Movements
            && elapsed_s(now_ms, self.reminder_ms) > u64::from(self.timing.inactivity_reminder_s)
        {
            log::info!("No movement for {} s, reminding", self.timing.inactivity_reminder_s);
            if !self.is_vibrating {
                haptic.start_pulse(self.timing.reminder_pulse);
            }
            self.record.activeness_notifications =
                self.record.activeness_notifications.saturating_add(1);
            self.reminder_ms = now_ms;
            alerts.push(Alert::Inactivity);
        }

        if elapsed_s(now_ms, self.flush_ms) > u64::from(self.timing.flush_interval_s) {
            self.flush(now_ms, sink);
        }

        if wanted == self.state {
            let dwell = elapsed_s(now_ms, self.entered_ms);
            if wanted == PostureState::Incorrect
                && dwell > u64::from(self.settings.detection_time)
                && !self.is_vibrating
            {
                log::info!("Incorrect posture for {} s, starting feedback", dwell);
                self.is_vibrating = true;
                haptic.start();
                self.record.posture_notifications =
                    self.record.posture_notifications.saturating_add(1);
                alerts.push(Alert::SustainedIncorrect);
            }
            return alerts;
        }

        if self.is_vibrating {
            haptic.stop();
            self.is_vibrating = false;
        }

        if self.state == PostureState::Movements {
            self.reminder_ms = now_ms;
        }

        self.accrue(now_ms);
        log::info!(
            "Posture {} -> {} after {} s",
            self.state,
            wanted,
            elapsed_s(now_ms, self.entered_ms)
        );
        self.state = wanted;
        self.entered_ms = now_ms;
        alerts.push(Alert::StateChanged(wanted));
        alerts
    }

    /// Credit whole seconds spent in the current state since the last accrual.
    /// The sub-second remainder carries over to the next accrual.
    fn accrue(&mut self, now_ms: u64) {
        let secs = elapsed_s(now_ms, self.accrued_ms);
        self.accrued_ms += secs * 1000;
        let secs = u16::try_from(secs).unwrap_or(u16::MAX);

        let rec = &mut self.record;
        match self.state {
            PostureState::Movements => {}
            PostureState::Correct => {
                rec.seconds_not_moving = rec.seconds_not_moving.saturating_add(secs);
                rec.seconds_in_good_posture = rec.seconds_in_good_posture.saturating_add(secs);
            }
            PostureState::Incorrect => {
                rec.seconds_not_moving = rec.seconds_not_moving.saturating_add(secs);
                rec.seconds_in_bad_posture = rec.seconds_in_bad_posture.saturating_add(secs);
            }
            PostureState::Invalid => {
                rec.seconds_not_moving = rec.seconds_not_moving.saturating_add(secs);
            }
        }
    }

    fn flush(&mut self, now_ms: u64, sink: &mut dyn TelemetrySink) {
        self.accrue(now_ms);
        self.flush_ms = now_ms;
        self.record.timestamp = now_ms as u32;
        match sink.submit(self.record) {
            Ok(()) => self.record = TelemetryRecord::default(),
            Err(e) => log::warn!("Telemetry flush skipped: {}", e),
        }
    }
}
