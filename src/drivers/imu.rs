// PostureBand - MPU6050 Accelerometer Driver
//
// Register-level driver over the shared I2C bus. Only the accelerometer is
// used; readings are returned in mm/s^2.

use std::sync::{Mutex, MutexGuard, PoisonError};

use esp_idf_hal::i2c::I2cDriver;

use postureband::config::*;
use postureband::RawAccel;

/// Thread-safe handle to a shared I2C bus.
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

// MPU6050 register addresses
const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_CONFIG: u8 = 0x1A;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_ACCEL_XOUT_H: u8 = 0x3B; // Start of the 6-byte accel burst
const REG_WHO_AM_I: u8 = 0x75;
const WHO_AM_I_EXPECTED: u8 = 0x68;

pub struct Mpu6050 {
    bus: SharedBus,
}

impl Mpu6050 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }

    fn bus(&self) -> MutexGuard<'_, I2cDriver<'static>> {
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Verify the device is reachable on the I2C bus.
    pub fn is_connected(&self) -> bool {
        let mut buf = [0u8; 1];
        match self
            .bus()
            .write_read(I2C_ADDR_MPU6050, &[REG_WHO_AM_I], &mut buf, I2C_TIMEOUT_TICKS)
        {
            Ok(()) => buf[0] == WHO_AM_I_EXPECTED,
            Err(_) => false,
        }
    }

    /// Wake the sensor and configure accel (±8 g), DLPF 21 Hz.
    pub fn init(&self) -> anyhow::Result<()> {
        let mut bus = self.bus();

        // Wake up (clear SLEEP bit)
        bus.write(I2C_ADDR_MPU6050, &[REG_PWR_MGMT_1, 0x00], I2C_TIMEOUT_TICKS)?;
        bus.write(I2C_ADDR_MPU6050, &[REG_CONFIG, 0x04], I2C_TIMEOUT_TICKS)?;
        bus.write(I2C_ADDR_MPU6050, &[REG_ACCEL_CONFIG, 0x10], I2C_TIMEOUT_TICKS)?;

        log::info!("MPU6050 initialised (±8g, DLPF 21Hz)");
        Ok(())
    }

    pub fn read_accel(&self) -> anyhow::Result<RawAccel> {
        let mut raw = [0u8; 6];
        self.bus().write_read(
            I2C_ADDR_MPU6050,
            &[REG_ACCEL_XOUT_H],
            &mut raw,
            I2C_TIMEOUT_TICKS,
        )?;

        let g = |hi: u8, lo: u8| i16::from_be_bytes([hi, lo]) as f32 / ACCEL_SCALE_8G;
        Ok(RawAccel::from_g(
            g(raw[0], raw[1]),
            g(raw[2], raw[3]),
            g(raw[4], raw[5]),
        ))
    }
}
