//! HX711 24-bit load-cell ADC, bit-banged over two GPIOs.
//!
//! ## Protocol
//!
//! DOUT goes low when a conversion is ready.  25 SCK pulses then shift
//! out 24 data bits MSB first (two's complement) and select channel A,
//! gain 128 for the next conversion.  SCK held high for more than 60 µs
//! powers the chip down, so each pulse is kept short.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::SensorError;
use crate::sensors::scale::{Calibration, LoadCell};

/// How long to wait for DOUT to signal a ready conversion (10 SPS → 100 ms).
const READY_TIMEOUT_MS: u32 = 200;
const READY_POLL_MS: u32 = 1;
const DATA_BITS: u8 = 24;
/// Extra pulses after the data: 1 → channel A, gain 128.
const GAIN_PULSES: u8 = 1;

pub struct Hx711<DOUT, SCK, D> {
    dout: DOUT,
    sck: SCK,
    delay: D,
    calibration: Calibration,
}

impl<DOUT, SCK, D> Hx711<DOUT, SCK, D>
where
    DOUT: InputPin,
    SCK: OutputPin,
    D: DelayNs,
{
    pub fn new(dout: DOUT, mut sck: SCK, delay: D, calibration: Calibration) -> Result<Self, SensorError> {
        sck.set_low().map_err(|_| SensorError::NoResponse)?;
        Ok(Self {
            dout,
            sck,
            delay,
            calibration,
        })
    }

    fn wait_ready(&mut self) -> Result<(), SensorError> {
        let mut waited = 0;
        while self.dout.is_high().map_err(|_| SensorError::NoResponse)? {
            if waited >= READY_TIMEOUT_MS {
                return Err(SensorError::NotReady);
            }
            self.delay.delay_ms(READY_POLL_MS);
            waited += READY_POLL_MS;
        }
        Ok(())
    }

    fn pulse(&mut self) -> Result<bool, SensorError> {
        self.sck.set_high().map_err(|_| SensorError::NoResponse)?;
        self.delay.delay_us(1);
        let bit = self.dout.is_high().map_err(|_| SensorError::NoResponse)?;
        self.sck.set_low().map_err(|_| SensorError::NoResponse)?;
        self.delay.delay_us(1);
        Ok(bit)
    }

    /// One signed 24-bit conversion.
    pub fn read_raw(&mut self) -> Result<i32, SensorError> {
        self.wait_ready()?;
        let mut value: u32 = 0;
        for _ in 0..DATA_BITS {
            value = (value << 1) | u32::from(self.pulse()?);
        }
        for _ in 0..GAIN_PULSES {
            self.pulse()?;
        }
        Ok(sign_extend_24(value))
    }

    pub fn read_average(&mut self, times: u8) -> Result<f32, SensorError> {
        let times = times.max(1);
        let mut sum: i64 = 0;
        for _ in 0..times {
            sum += i64::from(self.read_raw()?);
        }
        Ok(sum as f32 / f32::from(times))
    }
}

impl<DOUT, SCK, D> LoadCell for Hx711<DOUT, SCK, D>
where
    DOUT: InputPin,
    SCK: OutputPin,
    D: DelayNs,
{
    fn read_kg(&mut self, times: u8) -> Result<f32, SensorError> {
        let raw = self.read_average(times)?;
        Ok(self.calibration.to_kg(raw))
    }
}

fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}
