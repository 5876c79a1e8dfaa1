use embedded_hal::i2c::I2c;
use embedded_hal_async::delay::DelayNs;
use log::info;

use super::Magnetometer;
use crate::error::{Error, Result};
use crate::state::Vector3;

const DEVICE: &str = "hmc5883";

pub const HMC5883L_ADDR: u8 = 0x1E;

const REG_CONFIG_A: u8 = 0x00;
const REG_CONFIG_B: u8 = 0x01;
const REG_MODE: u8 = 0x02;
const REG_DATA_X_MSB: u8 = 0x03;
const REG_ID_A: u8 = 0x0A;

const IDENTITY: [u8; 3] = *b"H43";

/// Gain 1.3 Ga → 1090 LSB/Ga
const LSB_PER_GAUSS: f32 = 1090.0;

pub struct Hmc5883<I, D> {
    i2c: I,
    delay: D,
}

impl<I: I2c, D: DelayNs> Hmc5883<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self { i2c, delay }
    }

    fn write_reg(&mut self, reg: u8, val: u8) -> Result<()> {
        self.i2c
            .write(HMC5883L_ADDR, &[reg, val])
            .map_err(|e| Error::bus(DEVICE, e))
    }

    pub fn read_raw(&mut self) -> Result<[i16; 3]> {
        let mut data = [0u8; 6];
        self.i2c
            .write_read(HMC5883L_ADDR, &[REG_DATA_X_MSB], &mut data)
            .map_err(|e| Error::bus(DEVICE, e))?;

        // Register layout is X, Z, Y
        let x = i16::from_be_bytes([data[0], data[1]]);
        let z = i16::from_be_bytes([data[2], data[3]]);
        let y = i16::from_be_bytes([data[4], data[5]]);

        Ok([x, y, z])
    }
}

impl<I: I2c, D: DelayNs> Magnetometer for Hmc5883<I, D> {
    async fn init(&mut self) -> Result<()> {
        let mut id = [0u8; 3];
        self.i2c
            .write_read(HMC5883L_ADDR, &[REG_ID_A], &mut id)
            .map_err(|e| Error::bus(DEVICE, e))?;
        if id != IDENTITY {
            return Err(Error::ChipId {
                device: DEVICE,
                found: u32::from_be_bytes([0, id[0], id[1], id[2]]),
            });
        }

        // 8-sample average, 15 Hz, normal measurement
        self.write_reg(REG_CONFIG_A, 0x70)?;
        // Gain 1.3 Ga
        self.write_reg(REG_CONFIG_B, 0x20)?;
        // Continuous measurement
        self.write_reg(REG_MODE, 0x00)?;

        self.delay.delay_ms(10).await;
        info!("{DEVICE}: magnetometer up");
        Ok(())
    }

    async fn read(&mut self) -> Result<Vector3> {
        let [x, y, z] = self.read_raw()?;
        Ok(Vector3::new(
            f32::from(x) / LSB_PER_GAUSS,
            f32::from(y) / LSB_PER_GAUSS,
            f32::from(z) / LSB_PER_GAUSS,
        ))
    }
}
