// PostureBand - Haptic Motor Driver
//
// GPIO-driven vibration motor. Pulses are ended by a one-shot ESP timer so
// the worker never blocks.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_svc::timer::{EspTaskTimerService, EspTimer};

use postureband::hal::Haptic;

type MotorPin = Arc<Mutex<PinDriver<'static, AnyOutputPin, Output>>>;

fn set(pin: &MotorPin, on: bool) {
    let mut pin = pin.lock().unwrap_or_else(PoisonError::into_inner);
    let res = if on { pin.set_high() } else { pin.set_low() };
    if let Err(e) = res {
        log::warn!("Haptic GPIO write failed: {}", e);
    }
}

pub struct GpioHaptic {
    pin: MotorPin,
    stop_timer: EspTimer<'static>,
}

impl GpioHaptic {
    pub fn new(
        pin: PinDriver<'static, AnyOutputPin, Output>,
        timers: &EspTaskTimerService,
    ) -> anyhow::Result<Self> {
        let pin: MotorPin = Arc::new(Mutex::new(pin));
        let timer_pin = Arc::clone(&pin);
        let stop_timer = timers.timer(move || set(&timer_pin, false))?;
        set(&pin, false);
        Ok(Self { pin, stop_timer })
    }

    fn cancel_timer(&self) {
        if let Err(e) = self.stop_timer.cancel() {
            log::warn!("Failed to cancel haptic timer: {}", e);
        }
    }
}

impl Haptic for GpioHaptic {
    fn start(&mut self) {
        self.cancel_timer();
        set(&self.pin, true);
    }

    fn start_pulse(&mut self, duration: Duration) {
        self.cancel_timer();
        set(&self.pin, true);
        if let Err(e) = self.stop_timer.after(duration) {
            log::error!("Failed to arm haptic timer: {}", e);
            set(&self.pin, false);
        }
    }

    fn stop(&mut self) {
        self.cancel_timer();
        set(&self.pin, false);
    }
}
