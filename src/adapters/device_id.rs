//! Node identity derived from the ESP32 factory MAC address.
//!
//! The hostname `hivemon-xxyyzz` (last three MAC bytes, lowercase hex)
//! doubles as the default access-point SSID, so a node in the field can
//! be told apart from its neighbours in the same apiary.

use core::fmt::Write;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

pub type Hostname = heapless::String<24>;

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: writes exactly six bytes into `mac`.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: a fixed fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0x24, 0x6F, 0x28, 0x1A, 0x2B, 0x3C]
}

/// `hivemon-xxyyzz`.
pub fn hostname(mac: &MacAddress) -> Hostname {
    let mut name = Hostname::new();
    let _ = write!(name, "hivemon-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}
