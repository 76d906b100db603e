//! GPIO / peripheral pin assignments for the hivemon carrier board.
//!
//! Single source of truth; every driver references this module rather than
//! hard-coding pin numbers.  The access-point button is the exception: its
//! pin comes from `general/general/button_ap_pin` so boards with the button
//! on a strapping pin can move it without a firmware build.

// ---------------------------------------------------------------------------
// One-wire temperature probes (DS18x20, 4.7 kΩ pull-up)
// ---------------------------------------------------------------------------

pub const ONEWIRE_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Climate sensor (BME280) on I²C
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
/// Standard mode keeps the long cable to the roof sensor happy.
pub const I2C_BAUDRATE_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// Load-cell ADC (HX711)
// ---------------------------------------------------------------------------

pub const HX711_DOUT_GPIO: i32 = 25;
pub const HX711_SCK_GPIO: i32 = 26;

// ---------------------------------------------------------------------------
// Status LED (discrete RGB, LEDC PWM)
// ---------------------------------------------------------------------------

pub const LED_R_GPIO: i32 = 16;
pub const LED_G_GPIO: i32 = 17;
pub const LED_B_GPIO: i32 = 18;
pub const LED_PWM_FREQ_HZ: u32 = 1_000;
