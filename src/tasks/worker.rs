// PostureBand - Worker Task
//
// Owns the device and runs queued work one item at a time.

use postureband::hal::{Haptic, SettingsStore};
use postureband::protocol::Transport;
use postureband::{Device, TelemetrySink, WorkReceiver};

pub fn worker_task<T, S, H, P>(mut device: Device<T, S, H, P>, rx: WorkReceiver)
where
    T: Transport,
    S: TelemetrySink,
    H: Haptic,
    P: SettingsStore,
{
    log::info!("Worker task started");

    while let Some(work) = rx.recv() {
        rx.dispatch(&mut device, work, crate::now_ms());
    }

    log::warn!("Work queue closed, exiting worker task");
}
