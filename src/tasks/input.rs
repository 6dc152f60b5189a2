// PostureBand - Input Task
//
// Polls the user button at ~100 Hz. Double click forgets the bonded phone,
// long press powers the device down.

use std::thread;
use std::time::Duration;

use esp_idf_hal::gpio::{AnyInputPin, Input, PinDriver};

use postureband::config::*;
use postureband::input::ButtonDecoder;
use postureband::{ButtonEvent, Work, WorkQueue};

pub fn input_task(button: PinDriver<'static, AnyInputPin, Input>, queue: WorkQueue) {
    log::info!("Input task started");

    let mut decoder = ButtonDecoder::new(crate::now_ms());
    let poll_interval = Duration::from_millis(INPUT_POLL_INTERVAL_MS);

    loop {
        // Active LOW with pull-up.
        match decoder.update(button.is_low(), crate::now_ms()) {
            Some(ButtonEvent::SingleClick) => log::info!("Button click"),
            Some(ButtonEvent::DoubleClick) => {
                log::info!("Button double click, removing bond");
                if !queue.submit(Work::RemoveBond) {
                    log::warn!("Worker gone, bond not removed");
                }
            }
            Some(ButtonEvent::LongPress) => {
                log::info!("Button long press, powering down");
                crate::enter_deep_sleep();
            }
            None => {}
        }

        thread::sleep(poll_interval);
    }
}
