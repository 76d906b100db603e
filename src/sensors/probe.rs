//! One-wire temperature probes: ROM addresses, the position map, and the
//! bus abstraction the hub drives.
//!
//! Probes are identified by their 64-bit ROM code, written in the config
//! as 16 lowercase hex digits in bus byte order (family code first).

use core::fmt;
use core::str::FromStr;
use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::error::SensorError;

/// Conversion time of a 12-bit DS18x20 reading.
pub const SETTLE_TIME_MS: u32 = 750;

/// 64-bit probe ROM code, bus byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProbeAddress([u8; 8]);

impl ProbeAddress {
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// From a ROM code packed little-endian (family code in the low byte),
    /// as the ESP-IDF one-wire search returns it.
    pub const fn from_u64_le(rom: u64) -> Self {
        Self(rom.to_le_bytes())
    }

    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub fn family(&self) -> u8 {
        self.0[0]
    }
}

impl fmt::Display for ProbeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Rejected ROM string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidAddress;

impl fmt::Display for InvalidAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("probe address must be 16 hex digits")
    }
}

impl FromStr for ProbeAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidAddress);
        }
        let mut bytes = [0u8; 8];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| InvalidAddress)?;
        }
        Ok(Self(bytes))
    }
}

// ---------------------------------------------------------------------------
// Position map
// ---------------------------------------------------------------------------

/// Bidirectional address ↔ position lookup, fixed after construction.
#[derive(Debug, Clone, Default)]
pub struct PositionMap {
    by_address: HashMap<ProbeAddress, String>,
    by_position: HashMap<String, ProbeAddress>,
}

impl PositionMap {
    /// Build from the configured `{position: address}` table.
    ///
    /// Malformed addresses are skipped.  When two positions name the same
    /// address the first one (in position-name order) wins.
    pub fn from_config(positions: &BTreeMap<String, String>) -> Self {
        let mut map = Self::default();
        for (position, raw) in positions {
            let Ok(addr) = raw.parse::<ProbeAddress>() else {
                warn!("Probes: ignoring position '{position}', bad address '{raw}'");
                continue;
            };
            if let Some(existing) = map.by_address.get(&addr) {
                warn!("Probes: {addr} already mapped to '{existing}', ignoring '{position}'");
                continue;
            }
            map.by_address.insert(addr, position.clone());
            map.by_position.insert(position.clone(), addr);
        }
        map
    }

    pub fn position_of(&self, addr: &ProbeAddress) -> Option<&str> {
        self.by_address.get(addr).map(String::as_str)
    }

    pub fn address_of(&self, position: &str) -> Option<ProbeAddress> {
        self.by_position.get(position).copied()
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// A one-wire bus with temperature probes on it.
///
/// `start_conversion` returns immediately; the caller waits
/// [`SETTLE_TIME_MS`] before `read_celsius`.
pub trait ProbeBus {
    /// Probes found at enumeration, in bus order.
    fn roms(&self) -> &[ProbeAddress];
    fn start_conversion(&mut self, rom: ProbeAddress) -> Result<(), SensorError>;
    fn read_celsius(&mut self, rom: ProbeAddress) -> Result<f32, SensorError>;
}

/// In-memory bus for host runs and tests.
#[derive(Debug, Clone, Default)]
pub struct SimProbeBus {
    roms: Vec<ProbeAddress>,
    readings: HashMap<ProbeAddress, Result<f32, SensorError>>,
    started: Vec<ProbeAddress>,
}

impl SimProbeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a probe that reports `reading` after conversion.
    pub fn with_probe(mut self, rom: ProbeAddress, reading: Result<f32, SensorError>) -> Self {
        self.roms.push(rom);
        self.readings.insert(rom, reading);
        self
    }

    /// Conversions started since construction, in order.
    pub fn started(&self) -> &[ProbeAddress] {
        &self.started
    }
}

impl ProbeBus for SimProbeBus {
    fn roms(&self) -> &[ProbeAddress] {
        &self.roms
    }

    fn start_conversion(&mut self, rom: ProbeAddress) -> Result<(), SensorError> {
        match self.readings.get(&rom) {
            Some(_) => {
                self.started.push(rom);
                Ok(())
            }
            None => Err(SensorError::NoResponse),
        }
    }

    fn read_celsius(&mut self, rom: ProbeAddress) -> Result<f32, SensorError> {
        if !self.started.contains(&rom) {
            return Err(SensorError::NotReady);
        }
        self.readings.get(&rom).copied().unwrap_or(Err(SensorError::NoResponse))
    }
}
