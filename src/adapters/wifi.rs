//! Wireless adapter.
//!
//! Implements [`NetworkGate`]: station (client) mode for uploads and NTP,
//! the field access point, and the shutdown path taken before deep sleep.
//!
//! ## Modes
//!
//! ```text
//!            enable_client                 enable_access_point
//!   Off ───────────────────▶ Station ─────────────────────────▶ Mixed
//!    │                                                            ▲
//!    └── enable_access_point ──▶ AccessPoint ── enable_client ────┘
//! ```
//!
//! Enabling one side never tears down the other, so a node that is
//! uploading over the apiary network keeps doing so while a beekeeper is
//! connected to its access point.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi`.
//! - **all other targets**: simulation stubs for host-side tests.

use log::{info, warn};

use crate::app::ports::NetworkGate;
use crate::config::{AccessPointConfig, WlanConfig};
use crate::drivers::status_led::{COLOUR_ACCESS_POINT, StatusLed};
use crate::error::NetworkError;

#[cfg(target_os = "espidf")]
use embedded_svc::wifi::{AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration};
#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

// ───────────────────────────────────────────────────────────────
// Mode
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WlanMode {
    Off,
    Station,
    AccessPoint,
    /// Access point and station at once.
    Mixed,
}

impl WlanMode {
    pub fn with_client(self) -> Self {
        match self {
            Self::Off | Self::Station => Self::Station,
            Self::AccessPoint | Self::Mixed => Self::Mixed,
        }
    }

    pub fn with_access_point(self) -> Self {
        match self {
            Self::Off | Self::AccessPoint => Self::AccessPoint,
            Self::Station | Self::Mixed => Self::Mixed,
        }
    }

    pub fn has_station(self) -> bool {
        matches!(self, Self::Station | Self::Mixed)
    }

    pub fn has_access_point(self) -> bool {
        matches!(self, Self::AccessPoint | Self::Mixed)
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), NetworkError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(NetworkError::InvalidCredentials);
    }
    Ok(())
}

/// Empty means open; otherwise WPA2 needs 8-64 bytes.
pub fn validate_password(password: &str) -> Result<(), NetworkError> {
    if password.is_empty() || (8..=64).contains(&password.len()) {
        Ok(())
    } else {
        Err(NetworkError::InvalidCredentials)
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct WlanManager {
    mode: WlanMode,
    connected: bool,
    client: WlanConfig,
    access_point: AccessPointConfig,
    led: StatusLed,
    cellular_detached: bool,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: whether the configured network "exists".
    #[cfg(not(target_os = "espidf"))]
    sim_network_reachable: bool,
}

impl WlanManager {
    /// `access_point.ssid` must already be resolved (non-empty).
    #[cfg(target_os = "espidf")]
    pub fn new(
        wifi: EspWifi<'static>,
        sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
        client: WlanConfig,
        access_point: AccessPointConfig,
        led: StatusLed,
    ) -> Result<Self, NetworkError> {
        let wifi = BlockingWifi::wrap(wifi, sysloop).map_err(|e| NetworkError::Driver(e.code()))?;
        Ok(Self {
            mode: WlanMode::Off,
            connected: false,
            client,
            access_point,
            led,
            cellular_detached: false,
            wifi,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn simulated(
        client: WlanConfig,
        access_point: AccessPointConfig,
        led: StatusLed,
        network_reachable: bool,
    ) -> Self {
        Self {
            mode: WlanMode::Off,
            connected: false,
            client,
            access_point,
            led,
            cellular_detached: false,
            sim_network_reachable: network_reachable,
        }
    }

    pub fn mode(&self) -> WlanMode {
        self.mode
    }

    pub fn led(&self) -> &StatusLed {
        &self.led
    }

    pub fn cellular_detached(&self) -> bool {
        self.cellular_detached
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn client_configuration(&self) -> ClientConfiguration {
        ClientConfiguration {
            ssid: self.client.ssid.as_str().try_into().unwrap_or_default(),
            password: self.client.password.as_str().try_into().unwrap_or_default(),
            auth_method: if self.client.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        }
    }

    #[cfg(target_os = "espidf")]
    fn ap_configuration(&self) -> AccessPointConfiguration {
        let open = validate_password(&self.access_point.password).is_err() || self.access_point.password.is_empty();
        AccessPointConfiguration {
            ssid: self.access_point.ssid.as_str().try_into().unwrap_or_default(),
            password: if open {
                Default::default()
            } else {
                self.access_point.password.as_str().try_into().unwrap_or_default()
            },
            auth_method: if open { AuthMethod::None } else { AuthMethod::WPA2Personal },
            channel: 1,
            ..Default::default()
        }
    }

    #[cfg(target_os = "espidf")]
    fn apply_mode(&mut self, mode: WlanMode) -> Result<(), NetworkError> {
        let conf = match mode {
            WlanMode::Off => return Ok(()),
            WlanMode::Station => Configuration::Client(self.client_configuration()),
            WlanMode::AccessPoint => Configuration::AccessPoint(self.ap_configuration()),
            WlanMode::Mixed => Configuration::Mixed(self.client_configuration(), self.ap_configuration()),
        };
        self.wifi
            .set_configuration(&conf)
            .map_err(|e| NetworkError::Configure(e.code()))?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| NetworkError::Driver(e.code()))?;
        }
        Ok(())
    }

    /// Associate with the configured network.  `Ok(false)` if it could not.
    #[cfg(target_os = "espidf")]
    fn platform_associate(&mut self) -> Result<bool, NetworkError> {
        if let Err(e) = self.wifi.connect() {
            warn!("WiFi: association with '{}' failed: {}", self.client.ssid, e);
            return Ok(false);
        }
        if let Err(e) = self.wifi.wait_netif_up() {
            warn!("WiFi: no DHCP lease from '{}': {}", self.client.ssid, e);
            let _ = self.wifi.disconnect();
            return Ok(false);
        }
        Ok(true)
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) {
        if let Err(e) = self.wifi.stop() {
            warn!("WiFi: stop failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn apply_mode(&mut self, mode: WlanMode) -> Result<(), NetworkError> {
        info!("WiFi(sim): mode -> {:?}", mode);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_associate(&mut self) -> Result<bool, NetworkError> {
        if self.sim_network_reachable {
            info!("WiFi(sim): associated with '{}'", self.client.ssid);
        } else {
            warn!("WiFi(sim): '{}' not in range", self.client.ssid);
        }
        Ok(self.sim_network_reachable)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.connected
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {
        info!("WiFi(sim): stopped");
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkGate
// ───────────────────────────────────────────────────────────────

impl NetworkGate for WlanManager {
    fn enable_client(&mut self) -> Result<(), NetworkError> {
        if self.mode.has_station() {
            return Ok(());
        }
        if let Err(e) = validate_ssid(&self.client.ssid).and_then(|()| validate_password(&self.client.password)) {
            warn!("WiFi: client not enabled, {}", e);
            return Ok(());
        }

        let next = self.mode.with_client();
        self.apply_mode(next)?;
        self.mode = next;
        info!("WiFi: connecting to '{}'", self.client.ssid);
        self.connected = self.platform_associate()?;
        if self.connected {
            info!("WiFi: connected");
        }
        Ok(())
    }

    fn enable_access_point(&mut self) -> Result<(), NetworkError> {
        if self.mode.has_access_point() {
            return Ok(());
        }
        if let Err(e) = validate_password(&self.access_point.password) {
            warn!("WiFi: AP password unusable ({}), AP will be open", e);
        }

        let next = self.mode.with_access_point();
        self.apply_mode(next)?;
        self.mode = next;
        self.led.set_colour(COLOUR_ACCESS_POINT);
        info!("WiFi: access point '{}' up", self.access_point.ssid);
        Ok(())
    }

    fn detach_cellular(&mut self) {
        // No cellular modem is fitted on this board; keep the bookkeeping so
        // the shutdown sequence is the same on boards that have one.
        if !self.cellular_detached {
            info!("Cellular: detached");
            self.cellular_detached = true;
        }
    }

    fn deinit_wireless(&mut self) {
        if self.mode == WlanMode::Off {
            return;
        }
        self.platform_stop();
        self.mode = WlanMode::Off;
        self.connected = false;
        self.led.off();
        info!("WiFi: deinitialised");
    }

    fn is_access_point_mode(&self) -> bool {
        self.mode.has_access_point()
    }

    fn is_client_connected(&self) -> bool {
        self.mode.has_station() && self.connected && self.platform_is_connected()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
