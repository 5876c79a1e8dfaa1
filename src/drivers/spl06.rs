use embedded_hal::i2c::I2c;
use embedded_hal_async::delay::DelayNs;
use log::info;

use super::Barometer;
use crate::error::{Error, Result};
use crate::state::BaroSample;

const DEVICE: &str = "spl06";

pub const DEFAULT_ADDR: u8 = 0x76;

const REG_PRESS_DATA: u8 = 0x00;
const REG_TEMP_DATA: u8 = 0x03;
const REG_PRS_CFG: u8 = 0x06;
const REG_TMP_CFG: u8 = 0x07;
const REG_MEAS_CFG: u8 = 0x08;
const REG_RESET: u8 = 0x0C;
const REG_CHIP_ID: u8 = 0x0D;
const REG_COEF: u8 = 0x10;

const CHIP_ID: u8 = 0x10;

/// 8× oversampling scale factor (datasheet table 4), pressure and temperature.
const SCALE_8X: f32 = 7864320.0;
const SEA_LEVEL_PA: f32 = 101325.0;

#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Spl06Coeffs {
    c0: i16,
    c1: i16,
    c00: i32,
    c10: i32,
    c01: i16,
    c11: i16,
    c20: i16,
    c21: i16,
    c30: i16,
}

impl Spl06Coeffs {
    /// Unpacks the 18-byte calibration block starting at `REG_COEF`.
    fn from_bytes(buf: &[u8; 18]) -> Self {
        let c0 = sign_extend(((buf[0] as i32) << 4) | ((buf[1] as i32) >> 4), 12) as i16;
        let c1 = sign_extend(((buf[1] as i32 & 0x0F) << 8) | (buf[2] as i32), 12) as i16;
        let c00 = sign_extend(
            ((buf[3] as i32) << 12) | ((buf[4] as i32) << 4) | ((buf[5] as i32) >> 4),
            20,
        );
        let c10 = sign_extend(
            ((buf[5] as i32 & 0x0F) << 16) | ((buf[6] as i32) << 8) | (buf[7] as i32),
            20,
        );
        let be = |i: usize| i16::from_be_bytes([buf[i], buf[i + 1]]);

        Self {
            c0,
            c1,
            c00,
            c10,
            c01: be(8),
            c11: be(10),
            c20: be(12),
            c21: be(14),
            c30: be(16),
        }
    }
}

fn sign_extend(raw: i32, bits: u32) -> i32 {
    let shift = 32 - bits;
    (raw << shift) >> shift
}

/// Hypsometric altitude against the standard sea-level reference.
pub fn pressure_to_altitude(pressure_pa: f32) -> f32 {
    44330.0 * (1.0 - (pressure_pa / SEA_LEVEL_PA).powf(1.0 / 5.255))
}

pub struct Spl06<I, D> {
    i2c: I,
    delay: D,
    addr: u8,
    coeffs: Spl06Coeffs,
    k_p: f32,
    k_t: f32,
}

impl<I: I2c, D: DelayNs> Spl06<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDR)
    }

    /// SDO pulled high moves the sensor to 0x77.
    pub fn with_address(i2c: I, delay: D, addr: u8) -> Self {
        Self {
            i2c,
            delay,
            addr,
            coeffs: Spl06Coeffs::default(),
            k_p: SCALE_8X,
            k_t: SCALE_8X,
        }
    }

    pub fn read_id(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.addr, &[REG_CHIP_ID], &mut buf)
            .map_err(|e| Error::bus(DEVICE, e))?;
        Ok(buf[0])
    }

    fn write_reg(&mut self, reg: u8, val: u8) -> Result<()> {
        self.i2c
            .write(self.addr, &[reg, val])
            .map_err(|e| Error::bus(DEVICE, e))
    }

    /// 24-bit two's complement measurement register.
    fn read_24bits(&mut self, reg: u8) -> Result<i32> {
        let mut buf = [0u8; 3];
        self.i2c
            .write_read(self.addr, &[reg], &mut buf)
            .map_err(|e| Error::bus(DEVICE, e))?;
        let val = ((buf[0] as i32) << 16) | ((buf[1] as i32) << 8) | (buf[2] as i32);
        Ok(sign_extend(val, 24))
    }

    fn read_coeffs(&mut self) -> Result<()> {
        let mut buf = [0u8; 18];
        self.i2c
            .write_read(self.addr, &[REG_COEF], &mut buf)
            .map_err(|e| Error::bus(DEVICE, e))?;
        self.coeffs = Spl06Coeffs::from_bytes(&buf);
        Ok(())
    }

    /// Compensated pressure (Pa) and temperature (°C).
    pub fn read_pressure_temperature(&mut self) -> Result<(f32, f32)> {
        let p_sc = self.read_24bits(REG_PRESS_DATA)? as f32 / self.k_p;
        let t_sc = self.read_24bits(REG_TEMP_DATA)? as f32 / self.k_t;
        let c = &self.coeffs;

        let temp = c.c0 as f32 * 0.5 + c.c1 as f32 * t_sc;

        // Pcomp = c00 + Psc(c10 + Psc(c20 + Psc c30)) + Tsc c01 + Tsc Psc(c11 + Psc c21)
        let pressure = c.c00 as f32
            + p_sc * (c.c10 as f32 + p_sc * (c.c20 as f32 + p_sc * c.c30 as f32))
            + t_sc * c.c01 as f32
            + t_sc * p_sc * (c.c11 as f32 + p_sc * c.c21 as f32);

        Ok((pressure, temp))
    }
}

impl<I: I2c, D: DelayNs> Barometer for Spl06<I, D> {
    async fn init(&mut self) -> Result<()> {
        self.write_reg(REG_RESET, 0x09)?;
        self.delay.delay_ms(50).await;

        let id = self.read_id()?;
        if id != CHIP_ID {
            return Err(Error::ChipId {
                device: DEVICE,
                found: id.into(),
            });
        }

        self.read_coeffs()?;

        // Pressure: 16 meas/s, 8× oversampling
        self.write_reg(REG_PRS_CFG, 0x43)?;
        // Temperature: external sensor, 1 meas/s, 8× oversampling
        self.write_reg(REG_TMP_CFG, 0x83)?;
        // Continuous pressure + temperature
        self.write_reg(REG_MEAS_CFG, 0x07)?;

        self.delay.delay_ms(50).await;
        self.k_p = SCALE_8X;
        self.k_t = SCALE_8X;

        info!("{DEVICE}: barometer up at {:#04x}", self.addr);
        Ok(())
    }

    async fn read(&mut self) -> Result<BaroSample> {
        let (pressure, _temp) = self.read_pressure_temperature()?;
        Ok(BaroSample {
            pressure,
            alt: pressure_to_altitude(pressure),
        })
    }
}
