// PostureBand - System Events & Data Types

use std::fmt;

use crate::config::*;
use crate::posture::PostureSettings;

// ---------------------------------------------------------------------------
// Sensor Data (3-axis accelerometer reading, mm/s^2)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawAccel {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl RawAccel {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Convert an accelerometer reading in g to the common mm/s^2 unit.
    pub fn from_g(ax: f32, ay: f32, az: f32) -> Self {
        let conv = |g: f32| (g * STANDARD_GRAVITY_MM_S2) as i32;
        Self {
            x: conv(ax),
            y: conv(ay),
            z: conv(az),
        }
    }

    /// Vector magnitude, truncated to whole mm/s^2.
    pub fn magnitude(&self) -> u32 {
        let (x, y, z) = (f64::from(self.x), f64::from(self.y), f64::from(self.z));
        (x * x + y * y + z * z).sqrt() as u32
    }
}

// ---------------------------------------------------------------------------
// Orientation (one per tumbling window)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrientationSample {
    /// Main tilt, degrees.
    pub x_angle: i16,
    /// Side tilt, degrees.
    pub y_angle: i16,
    /// Largest jump between adjacent acceleration magnitudes in the window.
    pub motion_amplitude: u32,
}

impl OrientationSample {
    pub fn new(x_angle: i16, y_angle: i16, motion_amplitude: u32) -> Self {
        Self {
            x_angle,
            y_angle,
            motion_amplitude,
        }
    }
}

// ---------------------------------------------------------------------------
// Posture Classification
// ---------------------------------------------------------------------------
/// Discriminants are the wire values sent after the `S` marker.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostureState {
    #[default]
    Correct = 0,
    Invalid = 1,
    Movements = 2,
    Incorrect = 3,
}

impl PostureState {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Correct),
            1 => Some(Self::Invalid),
            2 => Some(Self::Movements),
            3 => Some(Self::Incorrect),
            _ => None,
        }
    }
}

impl fmt::Display for PostureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Correct => "correct",
            Self::Invalid => "invalid",
            Self::Movements => "movements",
            Self::Incorrect => "incorrect",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Classifier Alerts - forwarded to the protocol layer as notifications
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    /// The posture state changed to the contained value.
    StateChanged(PostureState),
    /// Incorrect posture held longer than the detection time.
    SustainedIncorrect,
    /// No movement for the inactivity reminder period.
    Inactivity,
    /// A pending calibration was captured; carries the updated settings.
    Calibrated(PostureSettings),
}

// ---------------------------------------------------------------------------
// Button Events
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    SingleClick,
    DoubleClick,
    /// Held for at least [`LONG_PRESS_MS`].
    LongPress,
}
