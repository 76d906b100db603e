//! One-shot hardware peripheral initialization.
//!
//! Configures the status-LED LEDC channels and the access-point button
//! interrupt using raw ESP-IDF sys calls.  Called once per boot from the
//! composition root before the scheduler starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    IsrInstallFailed(i32),
    InvalidPin(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::InvalidPin(pin) => write!(f, "GPIO {} is not usable", pin),
        }
    }
}

impl std::error::Error for HwInitError {}

// ── LEDC PWM (status LED) ─────────────────────────────────────

pub const LEDC_CH_LED_R: u32 = 0;
pub const LEDC_CH_LED_G: u32 = 1;
pub const LEDC_CH_LED_B: u32 = 2;

#[cfg(target_os = "espidf")]
pub fn init_status_led() -> Result<(), HwInitError> {
    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        freq_hz: pins::LED_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    // SAFETY: single-threaded boot path; the config struct outlives the call.
    esp!(unsafe { ledc_timer_config(&timer) }).map_err(|e| HwInitError::LedcInitFailed(e.code()))?;

    let channels = [
        (LEDC_CH_LED_R, pins::LED_R_GPIO),
        (LEDC_CH_LED_G, pins::LED_G_GPIO),
        (LEDC_CH_LED_B, pins::LED_B_GPIO),
    ];
    for (channel, gpio) in channels {
        let cfg = ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: gpio,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        };
        // SAFETY: as above.
        esp!(unsafe { ledc_channel_config(&cfg) }).map_err(|e| HwInitError::LedcInitFailed(e.code()))?;
    }

    info!("hw_init: status LED on LEDC CH0-2");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_status_led() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): status LED init skipped");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u8) {
    // SAFETY: channels were configured in init_status_led(); only the
    // main loop writes duty registers.
    unsafe {
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, u32::from(duty));
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(_channel: u32, _duty: u8) {}

// ── Access-point button ───────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn button_gpio_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: esp_timer_get_time is an RTC counter read; safe in ISR context.
    let now_ms = (unsafe { esp_timer_get_time() } / 1_000) as u32;
    crate::drivers::button::button_isr_handler(now_ms);
}

/// Configure `pin` as a pulled-up input and post a debounced
/// access-point request on every rising edge.
fn check_button_pin(pin: i32) -> Result<(), HwInitError> {
    if (0..64).contains(&pin) { Ok(()) } else { Err(HwInitError::InvalidPin(pin)) }
}

#[cfg(target_os = "espidf")]
pub fn init_button_isr(pin: i32) -> Result<(), HwInitError> {
    check_button_pin(pin)?;

    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_POSEDGE,
    };
    // SAFETY: single-threaded boot path.
    esp!(unsafe { gpio_config(&cfg) }).map_err(|e| HwInitError::GpioConfigFailed(e.code()))?;

    // SAFETY: ESP_ERR_INVALID_STATE means the service is already installed
    // (a previous boot path in this image); the handler registered below
    // only touches the lock-free event queue.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        esp!(gpio_isr_handler_add(pin, Some(button_gpio_isr), core::ptr::null_mut()))
            .map_err(|e| HwInitError::IsrInstallFailed(e.code()))?;
        gpio_intr_enable(pin);
    }

    info!("hw_init: AP button ISR on GPIO {}", pin);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_button_isr(pin: i32) -> Result<(), HwInitError> {
    check_button_pin(pin)?;
    log::info!("hw_init(sim): AP button ISR on GPIO {} skipped", pin);
    Ok(())
}
