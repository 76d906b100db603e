//! Per-cycle measurement record and log entries.

use std::collections::BTreeMap;

use serde::Serialize;

/// Reserved record keys for the climate sensor and the scale.
pub mod keys {
    /// Air temperature (°C).
    pub const TEMPERATURE: &str = "t";
    /// Air pressure (mbar).
    pub const PRESSURE: &str = "p";
    /// Relative humidity (%).
    pub const HUMIDITY: &str = "h";
    /// Scale reading (kg).
    pub const WEIGHT: &str = "weight_kg";
}

/// Field name → value for one measurement cycle.
///
/// Built fresh by the sampler every cycle, handed to the log path once,
/// then dropped.  Field order is stable (sorted) so CSV rows and upload
/// bodies are deterministic.  Only finite values are ever stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MeasurementRecord {
    fields: BTreeMap<String, f32>,
}

impl MeasurementRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `field`.  NaN and infinities are dropped and
    /// `false` is returned.
    pub fn insert(&mut self, field: impl Into<String>, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.fields.insert(field.into(), value);
        true
    }

    pub fn get(&self, field: &str) -> Option<f32> {
        self.fields.get(field).copied()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl core::fmt::Display for MeasurementRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v:.2}")?;
        }
        write!(f, "}}")
    }
}

/// What the log sink accepts: a structured record or a diagnostic line.
#[derive(Debug, Clone, Copy)]
pub enum LogEntry<'a> {
    Record(&'a MeasurementRecord),
    Message(&'a str),
}
