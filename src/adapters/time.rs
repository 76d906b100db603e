//! Time adapters: the monotonic [`Clock`] and the wall-clock RTC.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for monotonic
//!   time, `settimeofday` and SNTP for the RTC (which keeps running
//!   through deep sleep).
//! - **host**: `std::time::Instant` and the system clock.

use core::time::Duration;

use log::{info, warn};

use crate::app::ports::{Clock, TimeSync};
use crate::error::TimeSyncError;

/// 2020-01-01T00:00:00Z.  An RTC earlier than this has never been set.
pub const EPOCH_2020: i64 = 1_577_836_800;

// ───────────────────────────────────────────────────────────────
// Monotonic clock
// ───────────────────────────────────────────────────────────────

/// Elapsed-time source; one instance per measured span.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    #[cfg(target_os = "espidf")]
    started_us: Option<i64>,
    #[cfg(not(target_os = "espidf"))]
    started: Option<std::time::Instant>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock already running from now.
    pub fn started() -> Self {
        let mut c = Self::new();
        c.start();
        c
    }
}

impl Clock for MonotonicClock {
    #[cfg(target_os = "espidf")]
    fn start(&mut self) {
        // SAFETY: esp_timer_get_time reads the high-resolution timer.
        self.started_us = Some(unsafe { esp_idf_svc::sys::esp_timer_get_time() });
    }

    #[cfg(target_os = "espidf")]
    fn elapsed(&self) -> Duration {
        let Some(start) = self.started_us else {
            return Duration::ZERO;
        };
        // SAFETY: as above.
        let now = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
        Duration::from_micros(now.saturating_sub(start).max(0) as u64)
    }

    #[cfg(not(target_os = "espidf"))]
    fn start(&mut self) {
        self.started = Some(std::time::Instant::now());
    }

    #[cfg(not(target_os = "espidf"))]
    fn elapsed(&self) -> Duration {
        self.started.map_or(Duration::ZERO, |s| s.elapsed())
    }
}

// ───────────────────────────────────────────────────────────────
// Wall clock
// ───────────────────────────────────────────────────────────────

/// Current wall time as Unix seconds, `None` while the RTC is unset.
pub fn wall_clock_unix() -> Option<i64> {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .ok()?
        .as_secs();
    i64::try_from(secs).ok().filter(|s| reads_as_set(*s))
}

/// Whether a wall time this far along counts as a set RTC.
pub fn reads_as_set(unix_secs: i64) -> bool {
    unix_secs >= EPOCH_2020
}

/// RTC maintenance: seed once, then keep in step with NTP.
#[derive(Debug, Default)]
pub struct RtcAdapter;

impl RtcAdapter {
    pub fn new() -> Self {
        Self
    }

    #[cfg(target_os = "espidf")]
    fn set_clock(unix_secs: i64) -> Result<(), TimeSyncError> {
        let tv = esp_idf_svc::sys::timeval {
            tv_sec: unix_secs as esp_idf_svc::sys::time_t,
            tv_usec: 0,
        };
        // SAFETY: settimeofday copies the timeval; a null timezone is allowed.
        let rc = unsafe { esp_idf_svc::sys::settimeofday(&tv, core::ptr::null()) };
        if rc == 0 { Ok(()) } else { Err(TimeSyncError::SetClock(rc)) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_clock(unix_secs: i64) -> Result<(), TimeSyncError> {
        info!("RTC(sim): host clock left alone (requested {})", unix_secs);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_sync(server: &str) -> Result<(), TimeSyncError> {
        use esp_idf_svc::sntp::{EspSntp, SntpConf, SyncStatus};

        const SYNC_TIMEOUT_MS: u32 = 10_000;
        const POLL_MS: u32 = 100;

        let mut conf = SntpConf::default();
        conf.servers[0] = server;
        let sntp = EspSntp::new(&conf).map_err(|e| TimeSyncError::Start(e.code()))?;

        let mut waited = 0;
        while sntp.get_sync_status() != SyncStatus::Completed {
            if waited >= SYNC_TIMEOUT_MS {
                return Err(TimeSyncError::Timeout);
            }
            esp_idf_hal::delay::FreeRtos::delay_ms(POLL_MS);
            waited += POLL_MS;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_sync(server: &str) -> Result<(), TimeSyncError> {
        info!("RTC(sim): sync against '{}' uses the host clock", server);
        Ok(())
    }
}

/// The RTC needs seeding when it reads as unset.
pub fn needs_seed(now: Option<i64>) -> bool {
    now.is_none()
}

impl TimeSync for RtcAdapter {
    fn now_unix(&self) -> Option<i64> {
        wall_clock_unix()
    }

    fn seed_if_unset(&mut self, unix_secs: i64) -> bool {
        if !needs_seed(self.now_unix()) {
            return false;
        }
        match Self::set_clock(unix_secs) {
            Ok(()) => {
                info!("RTC: seeded with {}", unix_secs);
                true
            }
            Err(e) => {
                warn!("RTC: seeding failed: {}", e);
                false
            }
        }
    }

    fn sync(&mut self, server: &str) -> Result<(), TimeSyncError> {
        Self::platform_sync(server)?;
        info!("RTC: synchronised with {}", server);
        Ok(())
    }
}
