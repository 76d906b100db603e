//! Hive scale (load cell behind a 24-bit ADC).

use crate::error::SensorError;

/// Raw samples averaged per weight reading.
pub const OVERSAMPLE: u8 = 5;

/// Tare offset and counts-per-kilogram applied to the averaged raw count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub offset: f32,
    pub counts_per_kg: f32,
}

impl Calibration {
    pub fn to_kg(&self, raw_average: f32) -> f32 {
        (raw_average - self.offset) / self.counts_per_kg
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            offset: 0.0,
            counts_per_kg: 1.0,
        }
    }
}

pub trait LoadCell {
    /// Average `times` samples and return kilograms.
    fn read_kg(&mut self, times: u8) -> Result<f32, SensorError>;
}

/// Fixed-output load cell for host runs and tests.
#[derive(Debug, Clone, Default)]
pub struct SimLoadCell {
    reading: Option<f32>,
    /// Sample counts requested so far.
    pub requests: Vec<u8>,
}

impl SimLoadCell {
    /// `None` simulates an unresponsive ADC.
    pub fn new(reading: Option<f32>) -> Self {
        Self {
            reading,
            requests: Vec::new(),
        }
    }
}

impl LoadCell for SimLoadCell {
    fn read_kg(&mut self, times: u8) -> Result<f32, SensorError> {
        self.requests.push(times);
        self.reading.ok_or(SensorError::NotReady)
    }
}
