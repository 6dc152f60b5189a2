//! PostureBand firmware core.
//!
//! Accelerometer readings are reduced to orientation samples
//! ([`orientation`]), classified into a posture state with dwell timers and
//! haptic feedback ([`posture`]), and exposed to a paired phone over a
//! notification channel ([`protocol`]). [`runtime`] ties the pieces together
//! behind a single work queue. Hardware sits behind the traits in [`hal`] and
//! [`protocol::Transport`]; the ESP32-C3 implementations live in the firmware
//! binary.

pub mod config;
pub mod error;
pub mod events;
pub mod hal;
pub mod input;
pub mod orientation;
pub mod posture;
pub mod protocol;
pub mod runtime;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use error::{FrameError, SinkError, StoreError, TransportError};
pub use events::{Alert, ButtonEvent, OrientationSample, PostureState, RawAccel};
pub use orientation::OrientationEstimator;
pub use posture::{DetectorTiming, PostureDetector, PostureSettings};
pub use runtime::{work_queue, Device, Work, WorkQueue, WorkReceiver};
pub use telemetry::{RecordLog, TelemetryRecord, TelemetrySink};
