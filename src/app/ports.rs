//! Port traits: the hexagonal boundary between the power-cycle core and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PowerCycleScheduler (domain)
//! ```
//!
//! Driven adapters (clocks, sensors, log sinks, radios, the web portal)
//! implement these traits.  The scheduler consumes them via generics, so
//! the core never touches hardware directly and runs unchanged against
//! the mocks in `tests/integration/`.

use core::time::Duration;

use crate::app::record::{LogEntry, MeasurementRecord};
use crate::error::{NetworkError, TimeSyncError, UploadError};

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Monotonic elapsed-time source.
///
/// `elapsed()` is measured from the last `start()`.  A clock that was
/// never started reports zero.  Not required to survive deep sleep.
pub trait Clock {
    fn start(&mut self);
    fn elapsed(&self) -> Duration;
}

// ───────────────────────────────────────────────────────────────
// Sensor sampler (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Which sensor a [`SensorFault`] belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorSource {
    /// A one-wire temperature probe, by hex ROM address.
    Probe(String),
    Climate,
    Scale,
}

/// A single isolated read failure, reported alongside the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorFault {
    pub source: SensorSource,
    pub error: crate::error::SensorError,
}

impl core::fmt::Display for SensorFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.source {
            SensorSource::Probe(rom) => write!(f, "probe {rom}: {}", self.error),
            SensorSource::Climate => write!(f, "climate sensor: {}", self.error),
            SensorSource::Scale => write!(f, "scale: {}", self.error),
        }
    }
}

/// Everything one sampling pass produced.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub record: MeasurementRecord,
    pub faults: Vec<SensorFault>,
}

/// Read-side port: produce one record per call.
///
/// Never fails; individual sensor faults are returned in
/// [`Sample::faults`] and the corresponding fields are simply absent.
pub trait SensorSampler {
    fn sample(&mut self) -> Sample;
}

// ───────────────────────────────────────────────────────────────
// Log sink (driven adapter: domain → durable log / console)
// ───────────────────────────────────────────────────────────────

/// Durable destination for records and diagnostic lines.
///
/// Must never fail: write errors degrade to a console fallback.
pub trait LogSink {
    fn log(&mut self, entry: LogEntry<'_>);

    /// Convenience for free-text lines.
    fn message(&mut self, msg: &str) {
        self.log(LogEntry::Message(msg));
    }
}

impl<L: LogSink + ?Sized> LogSink for Box<L> {
    fn log(&mut self, entry: LogEntry<'_>) {
        (**self).log(entry);
    }
}

// ───────────────────────────────────────────────────────────────
// Upload (driven adapter: domain → remote collector)
// ───────────────────────────────────────────────────────────────

/// Best-effort remote collection.  Failures are the caller's to log.
pub trait UploadPort {
    fn add(&mut self, record: &MeasurementRecord) -> Result<(), UploadError>;
}

// ───────────────────────────────────────────────────────────────
// Network gate (driven adapter: domain → wireless stack)
// ───────────────────────────────────────────────────────────────

/// Binary control surface over the wireless subsystem.
///
/// All enable calls are idempotent with respect to the current mode.
/// Mode queries are synchronous and side-effect free.  A failure to
/// associate with the configured network is *not* an error; it leaves
/// [`is_client_connected`](Self::is_client_connected) false.
pub trait NetworkGate {
    fn enable_client(&mut self) -> Result<(), NetworkError>;
    fn enable_access_point(&mut self) -> Result<(), NetworkError>;
    fn detach_cellular(&mut self);
    fn deinit_wireless(&mut self);
    fn is_access_point_mode(&self) -> bool;
    fn is_client_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Web endpoint
// ───────────────────────────────────────────────────────────────

/// The field-configuration HTTP endpoint.  `start()` is idempotent.
pub trait WebEndpoint {
    fn start(&mut self) -> Result<(), NetworkError>;
    fn is_started(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Real-time clock
// ───────────────────────────────────────────────────────────────

/// Wall-clock maintenance.  Survives deep sleep on real hardware.
pub trait TimeSync {
    /// Current wall time as Unix seconds, `None` while unset.
    fn now_unix(&self) -> Option<i64>;

    /// Set the clock to `unix_secs` only if it is currently unset.
    /// Returns `true` if the clock was seeded.
    fn seed_if_unset(&mut self, unix_secs: i64) -> bool;

    /// Synchronise against an NTP server.
    fn sync(&mut self, server: &str) -> Result<(), TimeSyncError>;
}

// ───────────────────────────────────────────────────────────────
// Light sleep
// ───────────────────────────────────────────────────────────────

/// State-preserving suspend.  Execution resumes after `duration`.
///
/// Deep sleep and restart are deliberately absent: they end the boot and
/// are performed by the boot driver, never by the scheduler.
pub trait LightSleep {
    fn light_sleep(&mut self, duration: Duration);
}

impl<P: LightSleep + ?Sized> LightSleep for &mut P {
    fn light_sleep(&mut self, duration: Duration) {
        (**self).light_sleep(duration);
    }
}
