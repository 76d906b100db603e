//! Combined temperature / pressure / humidity sensor (BME280 class).

use crate::error::SensorError;

/// One compensated reading, in the sensor's native units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub celsius: f32,
    pub pascal: f32,
    pub humidity_pct: f32,
}

impl ClimateReading {
    pub fn millibar(&self) -> f32 {
        self.pascal / 100.0
    }
}

pub trait ClimateSensor {
    fn read(&mut self) -> Result<ClimateReading, SensorError>;
}

/// Fixed-output sensor for host runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct SimClimate {
    reading: Result<ClimateReading, SensorError>,
}

impl SimClimate {
    pub fn new(reading: Result<ClimateReading, SensorError>) -> Self {
        Self { reading }
    }
}

impl Default for SimClimate {
    fn default() -> Self {
        Self::new(Ok(ClimateReading {
            celsius: 18.4,
            pascal: 101_325.0,
            humidity_pct: 61.0,
        }))
    }
}

impl ClimateSensor for SimClimate {
    fn read(&mut self) -> Result<ClimateReading, SensorError> {
        self.reading
    }
}
