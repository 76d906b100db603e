//! Sensor subsystem: the probe bus, climate sensor and scale, and the
//! aggregating [`SensorHub`].
//!
//! The hub owns whichever sensors came up at boot and turns one pass
//! over them into a [`Sample`].  A sensor that failed to initialise is
//! simply absent; a sensor that fails a single read contributes a
//! [`SensorFault`] instead of its fields.

pub mod climate;
pub mod probe;
pub mod scale;

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::app::ports::{Sample, SensorFault, SensorSampler, SensorSource};
use crate::app::record::keys;
use climate::ClimateSensor;
use probe::{PositionMap, ProbeBus, SETTLE_TIME_MS};
use scale::{LoadCell, OVERSAMPLE};

struct Probes {
    bus: Box<dyn ProbeBus>,
    positions: PositionMap,
}

/// Aggregates the optional sensors and produces one record per call.
pub struct SensorHub<D: DelayNs> {
    probes: Option<Probes>,
    climate: Option<Box<dyn ClimateSensor>>,
    scale: Option<Box<dyn LoadCell>>,
    delay: D,
}

impl<D: DelayNs> SensorHub<D> {
    /// An empty hub.  `delay` provides the probe settle wait.
    pub fn new(delay: D) -> Self {
        Self {
            probes: None,
            climate: None,
            scale: None,
            delay,
        }
    }

    pub fn with_probes(mut self, bus: Box<dyn ProbeBus>, positions: PositionMap) -> Self {
        self.probes = Some(Probes { bus, positions });
        self
    }

    pub fn with_climate(mut self, sensor: Box<dyn ClimateSensor>) -> Self {
        self.climate = Some(sensor);
        self
    }

    pub fn with_scale(mut self, cell: Box<dyn LoadCell>) -> Self {
        self.scale = Some(cell);
        self
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }
}

/// Start every probe, wait once for the batch, then read each probe.
fn sample_probes(probes: &mut Probes, delay: &mut impl DelayNs, out: &mut Sample) {
    let roms = probes.bus.roms().to_vec();
    if roms.is_empty() {
        return;
    }

    let mut converting = Vec::with_capacity(roms.len());
    for rom in roms {
        match probes.bus.start_conversion(rom) {
            Ok(()) => converting.push(rom),
            Err(error) => fault(out, SensorSource::Probe(rom.to_string()), error),
        }
    }
    if converting.is_empty() {
        return;
    }

    delay.delay_ms(SETTLE_TIME_MS);

    for rom in converting {
        match probes.bus.read_celsius(rom) {
            Ok(celsius) => match probes.positions.position_of(&rom) {
                Some(position) => store(out, position, celsius),
                None => debug!("Sensors: unmapped probe {rom} = {celsius:.2}"),
            },
            Err(error) => fault(out, SensorSource::Probe(rom.to_string()), error),
        }
    }
}

fn store(out: &mut Sample, field: &str, value: f32) {
    if !out.record.insert(field, value) {
        warn!("Sensors: dropping non-finite {field} reading");
    }
}

fn fault(out: &mut Sample, source: SensorSource, error: crate::error::SensorError) {
    let f = SensorFault { source, error };
    warn!("Sensors: {f}");
    out.faults.push(f);
}

impl<D: DelayNs> SensorSampler for SensorHub<D> {
    fn sample(&mut self) -> Sample {
        let mut out = Sample::default();

        if let Some(probes) = self.probes.as_mut() {
            sample_probes(probes, &mut self.delay, &mut out);
        }

        if let Some(climate) = self.climate.as_mut() {
            match climate.read() {
                Ok(r) => {
                    store(&mut out, keys::TEMPERATURE, r.celsius);
                    store(&mut out, keys::PRESSURE, r.millibar());
                    store(&mut out, keys::HUMIDITY, r.humidity_pct);
                }
                Err(error) => fault(&mut out, SensorSource::Climate, error),
            }
        }

        if let Some(scale) = self.scale.as_mut() {
            match scale.read_kg(OVERSAMPLE) {
                Ok(kg) => store(&mut out, keys::WEIGHT, kg),
                Err(error) => fault(&mut out, SensorSource::Scale, error),
            }
        }

        out
    }
}

// ---------------------------------------------------------------------------
// Host delay
// ---------------------------------------------------------------------------

/// `DelayNs` over `std::thread::sleep`, for host runs.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

#[cfg(not(target_os = "espidf"))]
impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(core::time::Duration::from_nanos(u64::from(ns)));
    }
}
