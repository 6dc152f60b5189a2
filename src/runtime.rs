// PostureBand - Device Runtime
//
// One work queue serialises everything that touches the classifier and the
// link: orientation samples, radio events and button actions. Samples are
// "latest wins or skipped": while one is queued or being classified, newer
// ones are dropped. Radio events and button actions are always queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use crate::error::TransportError;
use crate::events::{Alert, OrientationSample};
use crate::hal::{Haptic, SettingsStore};
use crate::posture::{DetectorTiming, PostureDetector, PostureSettings};
use crate::protocol::{Link, ProtocolContext, Transport, TransportEvent};
use crate::telemetry::TelemetrySink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work {
    Sample(OrientationSample),
    Transport(TransportEvent),
    /// Forget the bonded peer (operator double click).
    RemoveBond,
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------
pub struct Device<T: Transport, S: TelemetrySink, H: Haptic, P: SettingsStore> {
    detector: PostureDetector,
    link: Link<T>,
    sink: S,
    haptic: H,
    store: P,
}

impl<T, S, H, P> Device<T, S, H, P>
where
    T: Transport,
    S: TelemetrySink,
    H: Haptic,
    P: SettingsStore,
{
    /// Restores saved settings, falling back to defaults when the store is
    /// empty or unreadable.
    pub fn new(transport: T, sink: S, haptic: H, mut store: P, timing: DetectorTiming, now_ms: u64) -> Self {
        let settings = match store.load() {
            Ok(Some(s)) => {
                log::info!("Loaded settings {:?}", s);
                s
            }
            Ok(None) => {
                log::info!("No saved settings, using defaults");
                PostureSettings::default()
            }
            Err(e) => {
                log::warn!("Failed to load settings ({}), using defaults", e);
                PostureSettings::default()
            }
        };

        Self {
            detector: PostureDetector::new(settings, timing, now_ms),
            link: Link::new(transport),
            sink,
            haptic,
            store,
        }
    }

    /// Start advertising according to the bond state.
    pub fn start(&mut self) -> Result<(), TransportError> {
        self.link.update_advertising()
    }

    pub fn detector(&self) -> &PostureDetector {
        &self.detector
    }

    pub fn link(&self) -> &Link<T> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut Link<T> {
        &mut self.link
    }

    pub fn haptic(&self) -> &H {
        &self.haptic
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn handle(&mut self, work: Work, now_ms: u64) {
        match work {
            Work::Sample(sample) => {
                let alerts = self
                    .detector
                    .update(&sample, now_ms, &mut self.haptic, &mut self.sink);
                for alert in alerts {
                    if let Alert::Calibrated(settings) = alert {
                        if let Err(e) = self.store.save(&settings) {
                            log::error!("Failed to save calibration: {}", e);
                        }
                    }
                    self.link.notify(alert.into());
                }
            }
            Work::Transport(event) => {
                let mut ctx = ProtocolContext {
                    detector: &mut self.detector,
                    sink: &mut self.sink,
                    store: &mut self.store,
                };
                self.link.handle_event(event, &mut ctx);
            }
            Work::RemoveBond => {
                if let Err(e) = self.link.remove_bond() {
                    log::error!("Failed to remove bond: {}", e);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Work queue
// ---------------------------------------------------------------------------
pub fn work_queue() -> (WorkQueue, WorkReceiver) {
    let (tx, rx) = mpsc::channel();
    let sample_pending = Arc::new(AtomicBool::new(false));
    (
        WorkQueue {
            tx,
            sample_pending: Arc::clone(&sample_pending),
        },
        WorkReceiver { rx, sample_pending },
    )
}

/// Producer side, cloned into the sensor, input and radio contexts.
#[derive(Clone)]
pub struct WorkQueue {
    tx: Sender<Work>,
    sample_pending: Arc<AtomicBool>,
}

impl WorkQueue {
    /// Returns `false` when the sample was skipped.
    pub fn submit_sample(&self, sample: OrientationSample) -> bool {
        if self.sample_pending.swap(true, Ordering::AcqRel) {
            log::debug!("Previous sample still pending, skipping");
            return false;
        }
        if self.tx.send(Work::Sample(sample)).is_err() {
            self.sample_pending.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// Queue a radio event or button action. `false` if the worker is gone.
    pub fn submit(&self, work: Work) -> bool {
        self.tx.send(work).is_ok()
    }
}

pub struct WorkReceiver {
    rx: Receiver<Work>,
    sample_pending: Arc<AtomicBool>,
}

impl WorkReceiver {
    /// Block for the next item. `None` once every producer is dropped.
    pub fn recv(&self) -> Option<Work> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Work> {
        self.rx.try_recv().ok()
    }

    /// Run one item on the device and re-open the sample slot afterwards.
    pub fn dispatch<T, S, H, P>(&self, device: &mut Device<T, S, H, P>, work: Work, now_ms: u64)
    where
        T: Transport,
        S: TelemetrySink,
        H: Haptic,
        P: SettingsStore,
    {
        let is_sample = matches!(work, Work::Sample(_));
        device.handle(work, now_ms);
        if is_sample {
            self.sample_pending.store(false, Ordering::Release);
        }
    }
}
