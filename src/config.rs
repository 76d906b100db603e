//! Node configuration.
//!
//! Stored as a JSON document of `section → subsection → key`, the shape
//! the field web portal edits one subsection at a time.  [`ConfigTree`]
//! is that document; [`NodeConfig`] is the typed, validated view the
//! power-cycle core reads once at boot and never again.

use std::collections::BTreeMap;
use std::path::Path;

use log::{info, warn};
use serde_json::{Value, json};

use crate::adapters::time::{EPOCH_2020, reads_as_set};
use crate::error::ConfigError;
use crate::power::MeasurementInterval;
use crate::sensors::scale::Calibration;

/// Built-in defaults, used when no config file exists yet.
fn default_document() -> Value {
    json!({
        "general": {
            "general": {
                "measurement_interval": 60.0,
                "button_ap_enabled": true,
                "button_ap_pin": 0,
                "initial_time": EPOCH_2020
            }
        },
        "networking": {
            "wlan": { "enabled": false, "ssid": "", "password": "" },
            "accesspoint": { "ssid": "", "password": "" },
            "ntp": { "server": "pool.ntp.org" }
        },
        "sensors": {
            "ds1820": { "enabled": true, "positions": {} },
            "bme280": { "enabled": true },
            "hx711": { "enabled": true, "offset": 0.0, "counts_per_kg": 1.0 }
        },
        "logging": {
            "csv": { "enabled": true, "dir": "log" },
            "beep": { "enabled": false, "url": "https://api.beep.nl/api/sensors", "key": "" }
        }
    })
}

// ═══════════════════════════════════════════════════════════════
//  Config tree
// ═══════════════════════════════════════════════════════════════

/// Three-level JSON configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigTree {
    root: Value,
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self {
            root: default_document(),
        }
    }
}

impl ConfigTree {
    /// Parse a document.  The root must be a JSON object.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let root: Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if !root.is_object() {
            return Err(ConfigError::Parse("root is not an object".into()));
        }
        Ok(Self { root })
    }

    /// Load from `path`; a missing file yields the built-in defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!("Config: loaded {}", path.display());
                Self::from_json(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config: {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e.to_string())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(&self.root)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| ConfigError::Io(e.to_string()))
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Look up `section/subsection/key`.
    pub fn get_value(&self, section: &str, subsection: &str, key: &str) -> Result<&Value, ConfigError> {
        self.get_subsection(section, subsection)
            .and_then(|s| s.get(key))
            .ok_or_else(|| ConfigError::Missing(format!("{section}/{subsection}/{key}")))
    }

    pub fn get_subsection(&self, section: &str, subsection: &str) -> Option<&Value> {
        self.root.get(section)?.get(subsection)
    }

    /// Replace (or create) one subsection.  Used by the web portal only.
    pub fn set_subsection(
        &mut self,
        section: &str,
        subsection: &str,
        value: Value,
    ) -> Result<(), ConfigError> {
        if !value.is_object() {
            return Err(ConfigError::WrongType {
                path: format!("{section}/{subsection}"),
                expected: "object",
            });
        }
        let Some(root) = self.root.as_object_mut() else {
            return Err(ConfigError::Parse("root is not an object".into()));
        };
        let sec = root
            .entry(section.to_owned())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        let Some(sec) = sec.as_object_mut() else {
            return Err(ConfigError::WrongType {
                path: section.to_owned(),
                expected: "object",
            });
        };
        sec.insert(subsection.to_owned(), value);
        Ok(())
    }

    // ── Typed accessors ───────────────────────────────────────

    pub fn get_f64(&self, section: &str, subsection: &str, key: &str) -> Result<f64, ConfigError> {
        self.get_value(section, subsection, key)?
            .as_f64()
            .ok_or_else(|| wrong_type(section, subsection, key, "number"))
    }

    pub fn get_i64(&self, section: &str, subsection: &str, key: &str) -> Result<i64, ConfigError> {
        self.get_value(section, subsection, key)?
            .as_i64()
            .ok_or_else(|| wrong_type(section, subsection, key, "integer"))
    }

    pub fn get_bool(&self, section: &str, subsection: &str, key: &str) -> Result<bool, ConfigError> {
        self.get_value(section, subsection, key)?
            .as_bool()
            .ok_or_else(|| wrong_type(section, subsection, key, "boolean"))
    }

    pub fn get_str(&self, section: &str, subsection: &str, key: &str) -> Result<&str, ConfigError> {
        self.get_value(section, subsection, key)?
            .as_str()
            .ok_or_else(|| wrong_type(section, subsection, key, "string"))
    }

    /// Optional flag: a missing key reads as `default`.
    fn flag_or(&self, section: &str, subsection: &str, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get_bool(section, subsection, key) {
            Err(ConfigError::Missing(_)) => Ok(default),
            other => other,
        }
    }

    /// Optional string: a missing key reads as empty.
    fn str_or_empty(&self, section: &str, subsection: &str, key: &str) -> Result<String, ConfigError> {
        match self.get_str(section, subsection, key) {
            Ok(s) => Ok(s.to_owned()),
            Err(ConfigError::Missing(_)) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }
}

fn wrong_type(section: &str, subsection: &str, key: &str, expected: &'static str) -> ConfigError {
    ConfigError::WrongType {
        path: format!("{section}/{subsection}/{key}"),
        expected,
    }
}

// ═══════════════════════════════════════════════════════════════
//  Typed view
// ═══════════════════════════════════════════════════════════════

/// Station (client) credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WlanConfig {
    pub enabled: bool,
    pub ssid: String,
    pub password: String,
}

/// Access-point credentials.  An empty SSID means "derive from the MAC".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointConfig {
    pub ssid: String,
    pub password: String,
}

/// Remote collector settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub url: String,
    pub key: String,
}

/// Which sensor modules the node should try to bring up.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorsConfig {
    pub probes: bool,
    pub climate: bool,
    pub scale: bool,
    /// Position name → probe ROM address (hex), as written by the portal.
    pub probe_positions: BTreeMap<String, String>,
    pub scale_calibration: Calibration,
}

/// Everything the core reads at boot.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub measurement_interval: MeasurementInterval,
    pub button_ap_enabled: bool,
    pub button_ap_pin: i32,
    /// Unix seconds used to seed an unset RTC.
    pub initial_time: i64,
    pub wlan: WlanConfig,
    pub access_point: AccessPointConfig,
    pub ntp_server: String,
    pub sensors: SensorsConfig,
    /// Durable CSV log directory, relative to the storage root; `None` if
    /// disabled.
    pub csv_dir: Option<String>,
    /// Remote upload, `None` if disabled.
    pub upload: Option<UploadConfig>,
}

impl NodeConfig {
    /// Build and validate the typed view.
    pub fn from_tree(tree: &ConfigTree) -> Result<Self, ConfigError> {
        let measurement_interval =
            MeasurementInterval::from_secs(tree.get_f64("general", "general", "measurement_interval")?)?;

        let button_ap_pin = tree.get_i64("general", "general", "button_ap_pin")?;
        let button_ap_pin = i32::try_from(button_ap_pin)
            .ok()
            .filter(|p| (0..=48).contains(p))
            .ok_or_else(|| ConfigError::Invalid {
                path: "general/general/button_ap_pin".into(),
                reason: "must be a GPIO number 0-48",
            })?;

        let wlan = WlanConfig {
            enabled: tree.flag_or("networking", "wlan", "enabled", false)?,
            ssid: tree.str_or_empty("networking", "wlan", "ssid")?,
            password: tree.str_or_empty("networking", "wlan", "password")?,
        };

        let access_point = AccessPointConfig {
            ssid: tree.str_or_empty("networking", "accesspoint", "ssid")?,
            password: tree.str_or_empty("networking", "accesspoint", "password")?,
        };

        let ntp_server = match tree.str_or_empty("networking", "ntp", "server")? {
            s if s.is_empty() => "pool.ntp.org".to_owned(),
            s => s,
        };

        let probe_positions = match tree.get_value("sensors", "ds1820", "positions") {
            Ok(v) => parse_positions(v)?,
            Err(ConfigError::Missing(_)) => BTreeMap::new(),
            Err(e) => return Err(e),
        };

        let scale_calibration = scale_calibration(tree)?;

        // A seed the RTC would still read as unset gets re-applied every boot.
        let initial_time = tree.get_i64("general", "general", "initial_time")?;
        if !reads_as_set(initial_time) {
            return Err(ConfigError::Invalid {
                path: "general/general/initial_time".into(),
                reason: "must be Unix seconds on or after 2020-01-01",
            });
        }

        let sensors = SensorsConfig {
            probes: tree.flag_or("sensors", "ds1820", "enabled", true)?,
            climate: tree.flag_or("sensors", "bme280", "enabled", true)?,
            scale: tree.flag_or("sensors", "hx711", "enabled", true)?,
            probe_positions,
            scale_calibration,
        };

        let csv_dir = if tree.flag_or("logging", "csv", "enabled", true)? {
            Some(tree.get_str("logging", "csv", "dir")?.to_owned())
        } else {
            None
        };

        let upload = if tree.flag_or("logging", "beep", "enabled", false)? {
            Some(UploadConfig {
                url: tree.get_str("logging", "beep", "url")?.to_owned(),
                key: tree.get_str("logging", "beep", "key")?.to_owned(),
            })
        } else {
            None
        };

        Ok(Self {
            measurement_interval,
            button_ap_enabled: tree.get_bool("general", "general", "button_ap_enabled")?,
            button_ap_pin,
            initial_time,
            wlan,
            access_point,
            ntp_server,
            sensors,
            csv_dir,
            upload,
        })
    }
}

fn scale_calibration(tree: &ConfigTree) -> Result<Calibration, ConfigError> {
    let defaults = Calibration::default();
    let number_or = |key: &str, default: f32| match tree.get_f64("sensors", "hx711", key) {
        Ok(v) => Ok(v as f32),
        Err(ConfigError::Missing(_)) => Ok(default),
        Err(e) => Err(e),
    };
    let cal = Calibration {
        offset: number_or("offset", defaults.offset)?,
        counts_per_kg: number_or("counts_per_kg", defaults.counts_per_kg)?,
    };
    if cal.counts_per_kg == 0.0 || !cal.counts_per_kg.is_finite() {
        return Err(ConfigError::Invalid {
            path: "sensors/hx711/counts_per_kg".into(),
            reason: "must be a non-zero number",
        });
    }
    Ok(cal)
}

fn parse_positions(v: &Value) -> Result<BTreeMap<String, String>, ConfigError> {
    let path = "sensors/ds1820/positions";
    let obj = v.as_object().ok_or(ConfigError::WrongType {
        path: path.into(),
        expected: "object",
    })?;
    obj.iter()
        .map(|(position, addr)| {
            addr.as_str()
                .map(|a| (position.clone(), a.to_owned()))
                .ok_or(ConfigError::WrongType {
                    path: format!("{path}/{position}"),
                    expected: "string",
                })
        })
        .collect()
}
