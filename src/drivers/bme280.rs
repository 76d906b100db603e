//! BME280 climate sensor on I²C, via the `bme280` driver crate.

use bme280::i2c::BME280;
use embedded_hal::i2c::I2c;
use esp_idf_hal::delay::Ets;
use log::info;

use crate::error::SensorError;
use crate::sensors::climate::{ClimateReading, ClimateSensor};

pub struct Bme280Climate<I2C> {
    dev: BME280<I2C>,
}

impl<I2C: I2c> Bme280Climate<I2C> {
    /// Probe the sensor at the primary address (0x76) and load its
    /// calibration.
    pub fn new(i2c: I2C) -> Result<Self, SensorError> {
        let mut dev = BME280::new_primary(i2c);
        dev.init(&mut Ets).map_err(|_| SensorError::NoResponse)?;
        info!("BME280: initialised");
        Ok(Self { dev })
    }
}

impl<I2C: I2c> ClimateSensor for Bme280Climate<I2C> {
    fn read(&mut self) -> Result<ClimateReading, SensorError> {
        let m = self.dev.measure(&mut Ets).map_err(|_| SensorError::NoResponse)?;
        Ok(ClimateReading {
            celsius: m.temperature,
            pascal: m.pressure,
            humidity_pct: m.humidity,
        })
    }
}
