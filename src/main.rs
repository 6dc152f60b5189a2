// PostureBand - Firmware Entry Point
//
// Boot sequence:
//   1. Bring up logging, I2C, the button and the haptic motor.
//   2. Restore settings from NVS and build the device.
//   3. Start advertising.
//   4. Spawn sensor, input and worker tasks.
//
// The device enters deep sleep when the user holds the button for 3 seconds
// and wakes on the next press.

#[cfg(target_os = "espidf")]
mod drivers;
#[cfg(target_os = "espidf")]
mod tasks;

#[cfg(target_os = "espidf")]
use std::sync::Mutex;
#[cfg(target_os = "espidf")]
use std::thread;
#[cfg(target_os = "espidf")]
use std::time::Duration;

#[cfg(target_os = "espidf")]
use esp_idf_hal::gpio::{AnyInputPin, Input, InputPin, OutputPin, PinDriver};
#[cfg(target_os = "espidf")]
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
#[cfg(target_os = "espidf")]
use esp_idf_hal::prelude::*;
#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::EspDefaultNvsPartition;
#[cfg(target_os = "espidf")]
use esp_idf_svc::timer::EspTaskTimerService;

#[cfg(target_os = "espidf")]
use postureband::config::*;
#[cfg(target_os = "espidf")]
use postureband::{work_queue, Device, DetectorTiming, RecordLog};

#[cfg(target_os = "espidf")]
use crate::drivers::haptic::GpioHaptic;
#[cfg(target_os = "espidf")]
use crate::drivers::imu::Mpu6050;
#[cfg(target_os = "espidf")]
use crate::drivers::nvs::NvsSettingsStore;
#[cfg(target_os = "espidf")]
use crate::drivers::radio::DetachedRadio;

// ---------------------------------------------------------------------------
// Utility: milliseconds since boot
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
pub fn now_ms() -> u64 {
    unsafe { (esp_idf_sys::esp_timer_get_time() / 1000) as u64 }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("PostureBand firmware starting…");

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;

    // Button GPIO (pull-up, active LOW).
    let button = PinDriver::input(peripherals.pins.gpio3.downgrade_input())?;
    configure_pullup(&button);

    let haptic_pin = PinDriver::output(peripherals.pins.gpio4.downgrade_output())?;

    // ---- I2C bus ----------------------------------------------------------
    let i2c_config = I2cConfig::new().baudrate(400u32.kHz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio6, // SDA
        peripherals.pins.gpio7, // SCL
        &i2c_config,
    )?;
    let i2c_bus: &'static Mutex<I2cDriver<'static>> = Box::leak(Box::new(Mutex::new(i2c)));

    if !Mpu6050::new(i2c_bus).is_connected() {
        // Continue anyway so we can still debug via serial.
        log::error!("Boot check FAILED: MPU6050 not responding");
    }

    // ---- Device -----------------------------------------------------------
    let timers = EspTaskTimerService::new()?;
    let haptic = GpioHaptic::new(haptic_pin, &timers)?;
    let store = NvsSettingsStore::new(EspDefaultNvsPartition::take()?)?;
    let sink = RecordLog::new(TELEMETRY_SECTOR_SIZE, TELEMETRY_SECTOR_COUNT);

    let mut device = Device::new(
        DetachedRadio::default(),
        sink,
        haptic,
        store,
        DetectorTiming::default(),
        now_ms(),
    );
    device.start()?;

    let (queue, rx) = work_queue();

    // ---- Spawn tasks (map to FreeRTOS tasks via std::thread) ---------------
    thread::Builder::new()
        .name("worker".into())
        .stack_size(STACK_WORKER)
        .spawn(move || tasks::worker::worker_task(device, rx))?;

    let sensor_queue = queue.clone();
    thread::Builder::new()
        .name("sensor".into())
        .stack_size(STACK_SENSOR)
        .spawn(move || tasks::sensor::sensor_task(i2c_bus, sensor_queue))?;

    thread::Builder::new()
        .name("input".into())
        .stack_size(STACK_INPUT)
        .spawn(move || tasks::input::input_task(button, queue))?;

    log::info!("Boot complete");

    // Main thread has nothing left to do; the timer service must stay alive.
    let _timers = timers;
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!(
        "postureband: firmware entry point targets ESP-IDF; \
         run `cargo test` for the host-side core"
    );
}

// ---------------------------------------------------------------------------
// Power helpers
// ---------------------------------------------------------------------------

/// Enable the internal pull-up on the button.
#[cfg(target_os = "espidf")]
fn configure_pullup(_pin: &PinDriver<'_, AnyInputPin, Input>) {
    unsafe {
        esp_idf_sys::gpio_set_pull_mode(
            PIN_BUTTON,
            esp_idf_sys::gpio_pull_mode_t_GPIO_PULLUP_ONLY,
        );
    }
}

/// Enter deep sleep with button-press wakeup. Does not return.
#[cfg(target_os = "espidf")]
pub fn enter_deep_sleep() -> ! {
    log::info!("Entering deep sleep, wake on button press (GPIO{})", PIN_BUTTON);
    unsafe {
        esp_idf_sys::esp_deep_sleep_enable_gpio_wakeup(
            1u64 << PIN_BUTTON,
            esp_idf_sys::esp_deepsleep_gpio_wake_up_mode_t_ESP_GPIO_WAKEUP_GPIO_LOW,
        );
        esp_idf_sys::esp_deep_sleep_start();
    }
}
