// PostureBand - Hardware & System Configuration
// Target: Seeed Studio Xiao ESP32-C3 (RISC-V)

// ---------------------------------------------------------------------------
// GPIO Pin Definitions (Xiao ESP32-C3 pinout)
// ---------------------------------------------------------------------------
pub const PIN_BUTTON: i32 = 3;      // D1/A1 - User button (INPUT_PULLUP, active LOW)
pub const PIN_HAPTIC: i32 = 4;      // D2/A2 - Haptic motor control
pub const PIN_I2C_SDA: i32 = 6;     // D4    - I2C data line
pub const PIN_I2C_SCL: i32 = 7;     // D5    - I2C clock line

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_MPU6050: u8 = 0x68;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_SENSOR: usize = 4096;
pub const STACK_INPUT: usize = 4096;
pub const STACK_WORKER: usize = 8192;

// ---------------------------------------------------------------------------
// Timing (milliseconds unless noted)
// ---------------------------------------------------------------------------
pub const SENSOR_SAMPLE_INTERVAL_MS: u64 = 50;         // 20 Hz raw sampling
pub const INPUT_POLL_INTERVAL_MS: u64 = 10;            // 100 Hz button poll
pub const DEBOUNCE_MS: u64 = 50;
pub const LONG_PRESS_MS: u64 = 3000;                   // 3-second hold
pub const DOUBLE_CLICK_WINDOW_MS: u64 = 400;
pub const HAPTIC_PULSE_MS: u64 = 300;                  // inactivity reminder buzz
pub const TELEMETRY_FLUSH_INTERVAL_S: u32 = 60;
pub const INACTIVITY_REMINDER_S: u32 = 30 * 60;        // 30 minutes without movement

// ---------------------------------------------------------------------------
// Orientation Estimator
// ---------------------------------------------------------------------------
/// Raw readings per emitted orientation sample (50 ms x 10 = 500 ms).
pub const ORIENTATION_WINDOW: usize = 10;

// ---------------------------------------------------------------------------
// Posture Classifier
// ---------------------------------------------------------------------------
/// Largest jump between adjacent acceleration magnitudes (mm/s^2) still
/// considered "not moving".
pub const MOVEMENT_THRESHOLD: u32 = 1000;
/// Plausibility envelope (degrees) on both axes; outside means `Invalid`.
pub const VALID_ANGLE_LIMIT: i16 = 50;
pub const HYSTERESIS_DEG: i16 = 2;

// ---------------------------------------------------------------------------
// Default Posture Settings
// ---------------------------------------------------------------------------
pub const DEFAULT_DETECTION_TIME_S: u8 = 10;
pub const DEFAULT_DETECTION_RANGE_DEG: u8 = 15;
pub const DEFAULT_X_CALIBRATION_DEG: i8 = 5;

// ---------------------------------------------------------------------------
// Wire Protocol
// ---------------------------------------------------------------------------
pub const DEVICE_NAME: &str = "PostureBand";
/// Nordic UART Service, little-endian as it appears in advertisement data.
pub const NUS_SERVICE_UUID: [u8; 16] = [
    0x9E, 0xCA, 0xDC, 0x24, 0x0E, 0xE5, 0xA9, 0xE0,
    0x93, 0xF3, 0xA3, 0xB5, 0x01, 0x00, 0x40, 0x6E,
];
/// One export notification: sequence byte + record payload.
pub const EXPORT_PAGE_SIZE: usize = 500;

// ---------------------------------------------------------------------------
// Telemetry Log
// ---------------------------------------------------------------------------
pub const TELEMETRY_SECTOR_SIZE: usize = 0x1000; // 4K
pub const TELEMETRY_SECTOR_COUNT: usize = 2;

// ---------------------------------------------------------------------------
// MPU6050 Sensor Scale Factors
// ---------------------------------------------------------------------------
pub const ACCEL_SCALE_8G: f32 = 4096.0;   // LSB/g at +-8 g
pub const STANDARD_GRAVITY_MM_S2: f32 = 9806.65;
