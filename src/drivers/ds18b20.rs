//! DS18x20 one-wire temperature probes.
//!
//! Scratchpad decoding and the Dallas CRC are plain functions; the bus
//! itself is the ESP-IDF RMT one-wire driver and exists only on device.

use crate::error::SensorError;

/// Family codes of the supported parts (DS18S20, DS18B20).
pub const FAMILY_DS18S20: u8 = 0x10;
pub const FAMILY_DS18B20: u8 = 0x28;

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const CMD_CONVERT_T: u8 = 0x44;
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const CMD_READ_SCRATCHPAD: u8 = 0xBE;
/// Power-on value of the temperature register; a read right after power
/// up without a conversion returns it.
const POWER_ON_RAW: i16 = 0x0550;

/// Dallas/Maxim CRC-8 (x⁸ + x⁵ + x⁴ + 1, reflected).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

/// Decode a 9-byte scratchpad into °C.
pub fn decode_scratchpad(family: u8, pad: &[u8; 9]) -> Result<f32, SensorError> {
    if crc8(&pad[..8]) != pad[8] {
        return Err(SensorError::Crc);
    }
    let raw = i16::from_le_bytes([pad[0], pad[1]]);
    if family == FAMILY_DS18B20 && raw == POWER_ON_RAW {
        return Err(SensorError::NotReady);
    }
    let celsius = match family {
        // 9-bit part: 0.5 °C per LSB, refined with COUNT_REMAIN.
        FAMILY_DS18S20 => {
            let count_remain = f32::from(pad[6]);
            let count_per_c = f32::from(pad[7]).max(1.0);
            f32::from(raw >> 1) - 0.25 + (count_per_c - count_remain) / count_per_c
        }
        _ => f32::from(raw) / 16.0,
    };
    if !(-55.0..=125.0).contains(&celsius) {
        return Err(SensorError::OutOfRange);
    }
    Ok(celsius)
}

#[cfg(target_os = "espidf")]
pub use esp::OneWireProbes;

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_hal::onewire::{OWCommand, OWDriver};
    use log::{info, warn};

    use super::{decode_scratchpad, CMD_CONVERT_T, CMD_READ_SCRATCHPAD, FAMILY_DS18B20, FAMILY_DS18S20};
    use crate::error::SensorError;
    use crate::sensors::probe::{ProbeAddress, ProbeBus};

    /// Probes on one RMT-driven one-wire bus, enumerated once at boot.
    pub struct OneWireProbes<'d> {
        bus: OWDriver<'d>,
        roms: Vec<ProbeAddress>,
    }

    impl<'d> OneWireProbes<'d> {
        pub fn new(mut bus: OWDriver<'d>) -> Result<Self, SensorError> {
            let mut roms = Vec::new();
            let search = bus.search().map_err(|_| SensorError::NoResponse)?;
            for found in search {
                match found {
                    Ok(addr) => {
                        let rom = ProbeAddress::from_u64_le(addr.address());
                        if matches!(rom.family(), FAMILY_DS18B20 | FAMILY_DS18S20) {
                            roms.push(rom);
                        }
                    }
                    Err(e) => warn!("OneWire: search aborted ({})", e),
                }
            }
            info!("OneWire: {} probe(s) found", roms.len());
            Ok(Self { bus, roms })
        }

        fn address(&mut self, rom: ProbeAddress, command: u8) -> Result<(), SensorError> {
            self.bus.reset().map_err(|_| SensorError::NoResponse)?;
            let mut frame = [0u8; 10];
            frame[0] = OWCommand::MatchRom as u8;
            frame[1..9].copy_from_slice(rom.as_bytes());
            frame[9] = command;
            self.bus.write(&frame).map_err(|_| SensorError::NoResponse)
        }
    }

    impl ProbeBus for OneWireProbes<'_> {
        fn roms(&self) -> &[ProbeAddress] {
            &self.roms
        }

        fn start_conversion(&mut self, rom: ProbeAddress) -> Result<(), SensorError> {
            self.address(rom, CMD_CONVERT_T)
        }

        fn read_celsius(&mut self, rom: ProbeAddress) -> Result<f32, SensorError> {
            self.address(rom, CMD_READ_SCRATCHPAD)?;
            let mut pad = [0u8; 9];
            self.bus.read(&mut pad).map_err(|_| SensorError::NoResponse)?;
            decode_scratchpad(rom.family(), &pad)
        }
    }
}
