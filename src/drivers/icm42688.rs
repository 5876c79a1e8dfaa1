use embedded_hal::spi::SpiDevice;
use embedded_hal_async::delay::DelayNs;
use log::info;

use super::Accelerometer;
use crate::error::{Error, Result};
use crate::state::Vector3;

const DEVICE: &str = "icm42688";

const REG_DEVICE_CONFIG: u8 = 0x11;
const REG_ACCEL_DATA_X1: u8 = 0x1F;
const REG_PWR_MGMT0: u8 = 0x4E;
const REG_ACCEL_CONFIG0: u8 = 0x50;
const REG_WHO_AM_I: u8 = 0x75;

const WHO_AM_I: u8 = 0x47;

/// ±16 g full scale, 1 kHz ODR
const ACCEL_CONFIG_16G_1KHZ: u8 = 0x06;
/// Accelerometer in low-noise mode, gyro off
const PWR_ACCEL_LN: u8 = 0x03;

/// ±16 g → 2048 LSB/g
const LSB_PER_G: f32 = 2048.0;
const STANDARD_GRAVITY: f32 = 9.80665;

pub struct Icm42688<S, D> {
    spi: S,
    delay: D,
}

impl<S: SpiDevice, D: DelayNs> Icm42688<S, D> {
    pub fn new(spi: S, delay: D) -> Self {
        Self { spi, delay }
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<()> {
        self.spi
            .write(&[reg & 0x7F, value])
            .map_err(|e| Error::bus(DEVICE, e))
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8> {
        let mut buf = [reg | 0x80, 0x00];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(|e| Error::bus(DEVICE, e))?;
        Ok(buf[1])
    }

    pub fn read_who_am_i(&mut self) -> Result<u8> {
        self.read_reg(REG_WHO_AM_I)
    }

    /// Raw accel counts, X/Y/Z.
    pub fn read_raw(&mut self) -> Result<[i16; 3]> {
        let mut buf = [0u8; 7];
        buf[0] = REG_ACCEL_DATA_X1 | 0x80;
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(|e| Error::bus(DEVICE, e))?;

        Ok([
            i16::from_be_bytes([buf[1], buf[2]]),
            i16::from_be_bytes([buf[3], buf[4]]),
            i16::from_be_bytes([buf[5], buf[6]]),
        ])
    }
}

impl<S: SpiDevice, D: DelayNs> Accelerometer for Icm42688<S, D> {
    async fn init(&mut self) -> Result<()> {
        // Soft reset
        self.write_reg(REG_DEVICE_CONFIG, 0x01)?;
        self.delay.delay_ms(10).await;

        let id = self.read_who_am_i()?;
        if id != WHO_AM_I {
            return Err(Error::ChipId {
                device: DEVICE,
                found: id.into(),
            });
        }

        self.write_reg(REG_ACCEL_CONFIG0, ACCEL_CONFIG_16G_1KHZ)?;
        self.write_reg(REG_PWR_MGMT0, PWR_ACCEL_LN)?;
        // Accel needs ~10 ms out of sleep; give it margin.
        self.delay.delay_ms(50).await;

        info!("{DEVICE}: accelerometer up (±16 g, 1 kHz)");
        Ok(())
    }

    async fn read(&mut self) -> Result<Vector3> {
        let [x, y, z] = self.read_raw()?;
        let scale = STANDARD_GRAVITY / LSB_PER_G;
        Ok(Vector3::new(
            f32::from(x) * scale,
            f32::from(y) * scale,
            f32::from(z) * scale,
        ))
    }
}
