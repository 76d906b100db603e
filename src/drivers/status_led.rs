//! RGB status LED.
//!
//! Three LEDC PWM channels drive discrete R/G/B LEDs.  The node keeps it
//! dark while measuring and lights it dim yellow while the access point
//! is up, so a beekeeper can see from a distance that the node is
//! reachable.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives three LEDC PWM channels via hw_init.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;

pub type Colour = (u8, u8, u8);

pub const OFF: Colour = (0, 0, 0);
/// Access point up.
pub const COLOUR_ACCESS_POINT: Colour = (0x11, 0x11, 0x00);

#[derive(Debug, Default)]
pub struct StatusLed {
    current: Colour,
}

impl StatusLed {
    pub fn new() -> Self {
        Self { current: OFF }
    }

    pub fn set_colour(&mut self, (r, g, b): Colour) {
        hw_init::ledc_set(hw_init::LEDC_CH_LED_R, r);
        hw_init::ledc_set(hw_init::LEDC_CH_LED_G, g);
        hw_init::ledc_set(hw_init::LEDC_CH_LED_B, b);
        self.current = (r, g, b);
    }

    pub fn off(&mut self) {
        self.set_colour(OFF);
    }

    pub fn current_colour(&self) -> Colour {
        self.current
    }
}
