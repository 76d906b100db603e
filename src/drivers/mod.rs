//! Peripheral drivers and hardware initialisation.

pub mod button;
pub mod ds18b20;
pub mod hw_init;
pub mod hx711;
pub mod status_led;

#[cfg(target_os = "espidf")]
pub mod bme280;
