//! Measurement and power-cycle scheduler.
//!
//! One boot of the node, from reset to the moment it hands control back
//! to the boot driver for a deep sleep or a restart.
//!
//! ```text
//!   Booting ──▶ AccessPointDecision ──▶ ┌──────────── CycleLoop ────────────┐
//!                                       │ events ─▶ Measure ─▶ Log/Upload  │
//!                                       │                    │             │
//!                                       │              SleepDecision       │
//!                                       └──────┬─────────────┬─────────────┘
//!                                              │ Light       │ Deep
//!                                              ▼             ▼
//!                                         light sleep   detach radios
//!                                         (loop again)  BootOutcome::DeepSleep
//! ```
//!
//! ## Clocks
//!
//! Two distinct [`Clock`] instances: the boot clock is started by the
//! composition root before anything else and is only ever read here; the
//! cycle clock is restarted at the top of every cycle.  Light sleep keeps
//! the boot clock running, so the field-access window is wall time since
//! reset, not work time.
//!
//! ## Field-access window
//!
//! While the boot clock is inside [`FIELD_ACCESS_WINDOW`] and the node did
//! not wake from deep sleep, it only ever light-sleeps: the access point
//! and web portal stay reachable for a beekeeper standing at the hive.

use core::time::Duration;

use log::{error, info, warn};

use crate::adapters::log_sink::format_unix;
use crate::app::access::{AccessOutcome, TransitionLatch, enable_field_access};
use crate::app::ports::{Clock, LightSleep, LogSink, NetworkGate, SensorSampler, TimeSync, UploadPort, WebEndpoint};
use crate::app::record::LogEntry;
use crate::config::NodeConfig;
use crate::error::Error;
use crate::events::{Event, EventQueue};
use crate::power::{
    BootOutcome, CycleTiming, FIELD_ACCESS_WINDOW, MeasurementInterval, ResetCause, RestartReason, SleepDecision,
    StallGuard, decide,
};

// ═══════════════════════════════════════════════════════════════
//  Settings
// ═══════════════════════════════════════════════════════════════

/// The slice of configuration the scheduler reads.  Fixed for the boot.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub interval: MeasurementInterval,
    pub window: Duration,
    /// Unix seconds used to seed an unset RTC.
    pub initial_time: i64,
    pub wlan_enabled: bool,
    pub ntp_server: String,
}

impl Settings {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            interval: config.measurement_interval,
            window: FIELD_ACCESS_WINDOW,
            initial_time: config.initial_time,
            wlan_enabled: config.wlan.enabled,
            ntp_server: config.ntp_server.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Collaborators
// ═══════════════════════════════════════════════════════════════

/// Everything the scheduler drives, built once per boot by the
/// composition root and moved in.
pub struct Parts<C, S, L, N, W, T, P> {
    /// Already started.
    pub boot_clock: C,
    pub cycle_clock: C,
    pub sampler: S,
    pub sink: L,
    pub net: N,
    pub web: W,
    pub rtc: T,
    pub sleeper: P,
    pub uploader: Option<Box<dyn UploadPort>>,
    pub events: &'static EventQueue,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

pub struct PowerCycleScheduler<C, S, L, N, W, T, P> {
    settings: Settings,
    cause: ResetCause,
    boot_clock: C,
    cycle_clock: C,
    sampler: S,
    sink: L,
    net: N,
    web: W,
    rtc: T,
    sleeper: P,
    uploader: Option<Box<dyn UploadPort>>,
    events: &'static EventQueue,
    latch: TransitionLatch,
    stall: StallGuard,
    cycles: u32,
}

impl<C, S, L, N, W, T, P> PowerCycleScheduler<C, S, L, N, W, T, P>
where
    C: Clock,
    S: SensorSampler,
    L: LogSink,
    N: NetworkGate,
    W: WebEndpoint,
    T: TimeSync,
    P: LightSleep,
{
    pub fn new(settings: Settings, cause: ResetCause, parts: Parts<C, S, L, N, W, T, P>) -> Self {
        Self {
            settings,
            cause,
            boot_clock: parts.boot_clock,
            cycle_clock: parts.cycle_clock,
            sampler: parts.sampler,
            sink: parts.sink,
            net: parts.net,
            web: parts.web,
            rtc: parts.rtc,
            sleeper: parts.sleeper,
            uploader: parts.uploader,
            events: parts.events,
            latch: TransitionLatch::new(),
            stall: StallGuard::new(),
            cycles: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Run the boot to completion.
    ///
    /// A fault is written to the log sink before it is returned; the boot
    /// driver restarts on any `Err`.
    pub fn run(&mut self) -> Result<BootOutcome, Error> {
        let result = self.startup().and_then(|()| self.cycle_loop());
        if let Err(e) = &result {
            error!("Scheduler: {}", e);
            self.sink.message(&format!("fault: {e}"));
        }
        result
    }

    /// Reset-cause banner, field access, RTC seed, client mode and NTP.
    pub fn startup(&mut self) -> Result<(), Error> {
        self.sink.message(&format!("Starting from: {}", self.cause.label()));

        if !self.cause.is_deep_sleep_wake() {
            self.open_field_access()?;
        }

        if self.rtc.seed_if_unset(self.settings.initial_time) {
            info!("Scheduler: RTC seeded with {}", format_unix(Some(self.settings.initial_time)));
        }

        if self.settings.wlan_enabled {
            self.net.enable_client()?;
            if self.net.is_client_connected() {
                self.sync_time();
            }
        }
        Ok(())
    }

    fn sync_time(&mut self) {
        self.sink.message(&format!("Pre Time: {}", format_unix(self.rtc.now_unix())));
        match self.rtc.sync(&self.settings.ntp_server) {
            Ok(()) => self.sink.message(&format!("Time: {}", format_unix(self.rtc.now_unix()))),
            Err(e) => warn!("Scheduler: NTP sync against {} failed: {}", self.settings.ntp_server, e),
        }
    }

    fn open_field_access(&mut self) -> Result<AccessOutcome, Error> {
        let outcome = enable_field_access(&self.latch, &mut self.net, &mut self.web, &mut self.sink)?;
        info!("Scheduler: field access {:?}", outcome);
        Ok(outcome)
    }

    fn cycle_loop(&mut self) -> Result<BootOutcome, Error> {
        loop {
            if let Some(outcome) = self.handle_events()? {
                return Ok(outcome);
            }
            match self.cycle()? {
                SleepDecision::Light(d) => {
                    info!("Scheduler: light sleep {} ms", d.as_millis());
                    self.sleeper.light_sleep(d);
                }
                SleepDecision::Deep(d) => {
                    self.net.detach_cellular();
                    self.net.deinit_wireless();
                    self.sink.message(&format!("deep sleep for {} s", d.as_secs()));
                    return Ok(BootOutcome::DeepSleep(d));
                }
            }
        }
    }

    // ── Events ────────────────────────────────────────────────

    /// Drain the main-loop queue.  Repeated AP requests coalesce into one
    /// transition.
    fn handle_events(&mut self) -> Result<Option<BootOutcome>, Error> {
        let mut access_requested = false;
        let mut restart = false;
        let mut config_saved = false;
        self.events.drain(|event| match event {
            Event::AccessPointRequested => access_requested = true,
            Event::RestartRequested => restart = true,
            Event::ConfigSaved => config_saved = true,
        });

        if config_saved {
            self.sink.message("configuration saved, applied on next boot");
        }
        if restart {
            self.sink.message("restart requested");
            return Ok(Some(BootOutcome::Restart(RestartReason::Requested)));
        }
        if access_requested {
            info!("Scheduler: access point requested");
            self.open_field_access()?;
        }
        Ok(None)
    }

    // ── One cycle ─────────────────────────────────────────────

    /// Measure, log, and decide.  Strictly in that order.
    ///
    /// A light-sleep decision on a boot clock that no longer advances
    /// would never reach the end of the window; that is a fault.
    fn cycle(&mut self) -> Result<SleepDecision, Error> {
        self.cycles += 1;
        self.cycle_clock.start();

        let sample = self.sampler.sample();
        for fault in &sample.faults {
            self.sink.message(&fault.to_string());
        }

        if self.net.is_client_connected() {
            if let Some(uploader) = self.uploader.as_mut() {
                if let Err(e) = uploader.add(&sample.record) {
                    warn!("Scheduler: upload failed: {}", e);
                }
            }
        }
        self.sink.log(LogEntry::Record(&sample.record));

        let timing = CycleTiming::new(self.settings.interval, self.cycle_clock.elapsed());
        let boot_elapsed = self.boot_clock.elapsed();
        self.sink.message(&format!(
            "Measurement took {:.3} s, remaining {:.3} s, boot time {:.3} s",
            timing.elapsed.as_secs_f64(),
            timing.remainder_secs,
            boot_elapsed.as_secs_f64()
        ));
        if timing.overran() {
            warn!("Scheduler: cycle {} overran the interval", self.cycles);
        }

        let decision = decide(self.cause, boot_elapsed, self.settings.window, &timing);
        if matches!(decision, SleepDecision::Light(_)) && self.stall.observe(boot_elapsed) {
            return Err(Error::UnexpectedLoopExit { cycles: self.cycles });
        }
        Ok(decision)
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn cause(&self) -> ResetCause {
        self.cause
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn sink(&self) -> &L {
        &self.sink
    }

    pub fn net(&self) -> &N {
        &self.net
    }

    pub fn web(&self) -> &W {
        &self.web
    }

    pub fn rtc(&self) -> &T {
        &self.rtc
    }

    pub fn sleeper(&self) -> &P {
        &self.sleeper
    }

    pub fn boot_clock(&self) -> &C {
        &self.boot_clock
    }
}
