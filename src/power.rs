//! Power-cycle primitives: reset cause, cycle timing, the sleep decision,
//! and the platform power manager.
//!
//! The decision logic here is pure and host-tested.  [`PowerManager`] is
//! the only place that touches the chip's sleep/reset registers.
//!
//! ```text
//!            ┌──────────── light sleep (RAM kept) ─────────────┐
//!            ▼                                                 │
//!  boot ─▶ cycle ─▶ decide ──── cause≠DEEPSLEEP ∧ boot<window ─┘
//!                     │
//!                     └── otherwise ─▶ deep sleep (RAM lost) ─▶ boot
//! ```

use core::fmt;
use core::time::Duration;

use log::info;

use crate::app::ports::LightSleep;
use crate::error::ConfigError;

/// How long after boot the node stays reachable over its access point.
pub const FIELD_ACCESS_WINDOW: Duration = Duration::from_secs(120);

/// Fixed deep-sleep length once outside the field-access window.
///
/// Deliberately not the computed remainder; see DESIGN.md.
pub const DEEP_SLEEP_DURATION: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Reset cause
// ---------------------------------------------------------------------------

/// Why the current boot began.  Read once per boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetCause {
    PowerOn,
    Hard,
    WatchdogTimeout,
    DeepSleepWake,
    SoftReset,
    BrownOut,
}

impl ResetCause {
    pub const ALL: [Self; 6] = [
        Self::PowerOn,
        Self::Hard,
        Self::WatchdogTimeout,
        Self::DeepSleepWake,
        Self::SoftReset,
        Self::BrownOut,
    ];

    /// Short label used in the device log and on the web portal.
    pub fn label(self) -> &'static str {
        match self {
            Self::PowerOn => "PWRON",
            Self::Hard => "HARD",
            Self::WatchdogTimeout => "WDT",
            Self::DeepSleepWake => "DEEPSLEEP",
            Self::SoftReset => "SOFT",
            Self::BrownOut => "BROWN_OUT",
        }
    }

    pub fn is_deep_sleep_wake(self) -> bool {
        self == Self::DeepSleepWake
    }
}

impl fmt::Display for ResetCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Measurement interval
// ---------------------------------------------------------------------------

/// Seconds between the starts of two measurement cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementInterval(f64);

impl MeasurementInterval {
    pub fn from_secs(secs: f64) -> Result<Self, ConfigError> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(ConfigError::Invalid {
                path: "general/general/measurement_interval".into(),
                reason: "must be a positive number of seconds",
            });
        }
        Ok(Self(secs))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Cycle timing
// ---------------------------------------------------------------------------

/// Work time of one cycle and what is left of the interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleTiming {
    pub elapsed: Duration,
    /// `interval − elapsed` in seconds; negative when the cycle overran.
    pub remainder_secs: f64,
}

impl CycleTiming {
    pub fn new(interval: MeasurementInterval, elapsed: Duration) -> Self {
        Self {
            elapsed,
            remainder_secs: interval.as_secs_f64() - elapsed.as_secs_f64(),
        }
    }

    pub fn overran(&self) -> bool {
        self.remainder_secs < 0.0
    }

    /// Sleep length: the magnitude of the remainder, whole milliseconds.
    ///
    /// An overrun cycle sleeps for the overrun rather than firing
    /// immediately.
    pub fn sleep_duration(&self) -> Duration {
        Duration::from_millis((self.remainder_secs.abs() * 1000.0) as u64)
    }
}

// ---------------------------------------------------------------------------
// Stall guard
// ---------------------------------------------------------------------------

/// Consecutive light-sleep cycles without boot-clock progress before the
/// loop gives up.
pub const MAX_STALLED_CYCLES: u32 = 3;

/// Detects a boot clock that has stopped advancing.
///
/// Only progress counts, not how much: a very short interval may consume
/// a fraction of a millisecond per cycle and is still making its way
/// towards the end of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StallGuard {
    last: Option<Duration>,
    stalled: u32,
}

impl StallGuard {
    pub const fn new() -> Self {
        Self { last: None, stalled: 0 }
    }

    /// Record the boot clock at a sleep decision.  Returns `true` once it
    /// has failed to advance for [`MAX_STALLED_CYCLES`] cycles in a row.
    pub fn observe(&mut self, boot_elapsed: Duration) -> bool {
        match self.last {
            Some(last) if boot_elapsed <= last => self.stalled += 1,
            _ => self.stalled = 0,
        }
        self.last = Some(boot_elapsed);
        self.stalled >= MAX_STALLED_CYCLES
    }
}

// ---------------------------------------------------------------------------
// Sleep decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepDecision {
    /// Suspend with RAM and radio state kept, then run another cycle.
    Light(Duration),
    /// Detach radios and power down; the next boot starts from scratch.
    Deep(Duration),
}

/// Pick the sleep branch for the end of a cycle.
pub fn decide(
    cause: ResetCause,
    boot_elapsed: Duration,
    window: Duration,
    timing: &CycleTiming,
) -> SleepDecision {
    if !cause.is_deep_sleep_wake() && boot_elapsed < window {
        SleepDecision::Light(timing.sleep_duration())
    } else {
        SleepDecision::Deep(DEEP_SLEEP_DURATION)
    }
}

// ---------------------------------------------------------------------------
// Boot outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// A fatal fault reached the boot driver.
    Fault,
    /// Someone asked for it (web portal `/restart`).
    Requested,
}

/// How a boot that did not fault ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    DeepSleep(Duration),
    Restart(RestartReason),
}

// ---------------------------------------------------------------------------
// Platform power manager
// ---------------------------------------------------------------------------

/// Chip-level sleep and reset control.
///
/// - **`target_os = "espidf"`**: `esp_reset_reason`, FreeRTOS delay for
///   light sleep (the AP and HTTP tasks keep running; automatic light
///   sleep is left to the ESP-IDF power-management config),
///   `esp_deep_sleep`, `esp_restart`.
/// - **host**: thread sleeps; a deep sleep or restart "reboots" the
///   simulation with the matching reset cause.
pub struct PowerManager {
    cause: ResetCause,
}

impl PowerManager {
    /// Read the reset cause of the current boot.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        // SAFETY: esp_reset_reason reads a latched RTC register.
        let raw = unsafe { esp_idf_svc::sys::esp_reset_reason() };
        let cause = reset_cause_from_esp(raw);
        info!("Power: reset reason {} -> {}", raw, cause);
        Self { cause }
    }

    /// Simulation: the first boot is a power-on.
    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self::with_cause(ResetCause::PowerOn)
    }

    /// A boot whose reset cause is already known (the previous boot's
    /// [`finish`](Self::finish) on the host).
    pub fn with_cause(cause: ResetCause) -> Self {
        info!("Power: boot with reset cause {}", cause);
        Self { cause }
    }

    pub fn reset_cause(&self) -> ResetCause {
        self.cause
    }

    /// End the boot.  Never returns on the device.
    #[cfg(target_os = "espidf")]
    pub fn finish(self, outcome: BootOutcome) -> ResetCause {
        match outcome {
            BootOutcome::DeepSleep(d) => {
                info!("Power: deep sleep for {} ms", d.as_millis());
                // SAFETY: esp_deep_sleep arms the RTC timer and powers down;
                // it does not return.
                unsafe { esp_idf_svc::sys::esp_deep_sleep(d.as_micros() as u64) }
            }
            BootOutcome::Restart(reason) => {
                info!("Power: restart ({:?})", reason);
                // SAFETY: esp_restart performs a software reset; no return.
                unsafe { esp_idf_svc::sys::esp_restart() }
            }
        }
    }

    /// Simulation: wait out the deep sleep and hand back the reset cause
    /// the next boot will observe.
    #[cfg(not(target_os = "espidf"))]
    pub fn finish(self, outcome: BootOutcome) -> ResetCause {
        match outcome {
            BootOutcome::DeepSleep(d) => {
                info!("Power(sim): deep sleep for {} ms", d.as_millis());
                std::thread::sleep(d);
                ResetCause::DeepSleepWake
            }
            BootOutcome::Restart(reason) => {
                info!("Power(sim): restart ({:?})", reason);
                ResetCause::SoftReset
            }
        }
    }
}

impl Default for PowerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LightSleep for PowerManager {
    #[cfg(target_os = "espidf")]
    fn light_sleep(&mut self, duration: Duration) {
        let ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn light_sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Map an ESP-IDF `esp_reset_reason_t` onto [`ResetCause`].
#[cfg(target_os = "espidf")]
#[allow(non_upper_case_globals)]
fn reset_cause_from_esp(raw: esp_idf_svc::sys::esp_reset_reason_t) -> ResetCause {
    use esp_idf_svc::sys::*;
    match raw {
        esp_reset_reason_t_ESP_RST_POWERON => ResetCause::PowerOn,
        esp_reset_reason_t_ESP_RST_DEEPSLEEP => ResetCause::DeepSleepWake,
        esp_reset_reason_t_ESP_RST_SW | esp_reset_reason_t_ESP_RST_PANIC => ResetCause::SoftReset,
        esp_reset_reason_t_ESP_RST_INT_WDT
        | esp_reset_reason_t_ESP_RST_TASK_WDT
        | esp_reset_reason_t_ESP_RST_WDT => ResetCause::WatchdogTimeout,
        esp_reset_reason_t_ESP_RST_BROWNOUT => ResetCause::BrownOut,
        _ => ResetCause::Hard,
    }
}
