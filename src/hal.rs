// PostureBand - Peripheral Interfaces
//
// Narrow interfaces to the actuators and stores the core drives. The firmware
// binary implements them on ESP-IDF; tests use in-memory fakes.

use std::time::Duration;

use crate::error::StoreError;
use crate::posture::PostureSettings;

/// Vibration motor. All calls are idempotent.
pub trait Haptic {
    /// Continuous vibration until `stop`.
    fn start(&mut self);

    /// Vibrate for `duration`, then stop on a timer. A new pulse re-arms the
    /// timer.
    fn start_pulse(&mut self, duration: Duration);

    fn stop(&mut self);
}

/// Persistence for `PostureSettings` across power cycles.
pub trait SettingsStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&mut self) -> Result<Option<PostureSettings>, StoreError>;

    fn save(&mut self, settings: &PostureSettings) -> Result<(), StoreError>;
}
