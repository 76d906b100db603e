//! Hivemon Firmware: Main Entry Point
//!
//! Composition root and fault boundary.  Every boot builds all
//! collaborators from scratch, hands them to the scheduler, and acts on
//! how the boot ended.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  MonotonicClock   SensorHub        FileLogSink    RtcAdapter   │
//! │  (Clock ×2)       (SensorSampler)  (LogSink)      (TimeSync)   │
//! │  WlanManager      ConfigPortal     BeepUploader   PowerManager │
//! │  (NetworkGate)    (WebEndpoint)    (UploadPort)   (LightSleep) │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │         PowerCycleScheduler (pure logic)               │    │
//! │  │  startup · measure · log · sleep decision              │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Button ISR ──▶ event queue ◀── web handlers                   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any `Err` out of a boot is logged and answered with a restart.  On the
//! device [`PowerManager::finish`] never returns; the host simulation
//! loops with the reset cause the next boot would observe.

#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use hivemon::adapters::device_id;
use hivemon::adapters::log_sink::{ConsoleLogSink, FileLogSink};
use hivemon::adapters::storage::Storage;
use hivemon::adapters::time::{MonotonicClock, RtcAdapter};
use hivemon::adapters::upload::BeepUploader;
use hivemon::adapters::web::{ConfigPortal, PortalState};
use hivemon::app::ports::{LogSink, UploadPort};
use hivemon::config::{ConfigTree, NodeConfig};
use hivemon::drivers::hw_init;
use hivemon::error::Error;
use hivemon::events::EVENTS;
use hivemon::power::{BootOutcome, PowerManager, RestartReason};
use hivemon::scheduler::{Parts, PowerCycleScheduler, Settings};

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_logging()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Hivemon v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let mut cause = PowerManager::new().reset_cause();
    loop {
        let mut power = PowerManager::with_cause(cause);
        let outcome = match boot(&mut power) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Boot: fatal: {:#}", e);
                BootOutcome::Restart(RestartReason::Fault)
            }
        };
        cause = power.finish(outcome);
    }
}

#[cfg(target_os = "espidf")]
fn init_logging() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn init_logging() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    Ok(())
}

// ── One boot ──────────────────────────────────────────────────

fn boot(power: &mut PowerManager) -> Result<BootOutcome> {
    // Started before anything else; the field-access window counts from here.
    let boot_clock = MonotonicClock::started();
    let cause = power.reset_cause();

    // ── 1. Storage + configuration ────────────────────────────
    let storage = Storage::mount()?;
    let tree = ConfigTree::load(&storage.config_path())?;
    let config = NodeConfig::from_tree(&tree)?;
    info!("Config: measurement interval {:.1} s", config.measurement_interval.as_secs_f64());

    // ── 2. Peripherals ────────────────────────────────────────
    EVENTS.drain(|_| {});
    hw_init::init_status_led().map_err(Error::from)?;
    if config.button_ap_enabled {
        hw_init::init_button_isr(config.button_ap_pin).map_err(Error::from)?;
    }

    let mut access_point = config.access_point.clone();
    if access_point.ssid.is_empty() {
        access_point.ssid = device_id::hostname(&device_id::read_mac()).as_str().to_owned();
    }
    let (net, sampler) = platform::build(&config, access_point)?;

    // ── 3. Sinks, portal, uploader ────────────────────────────
    let sink = build_sink(&storage, &config);
    let mut portal = PortalState::new(tree, storage.config_path(), cause.label(), &EVENTS);
    if let Some(dir) = &config.csv_dir {
        portal = portal.with_log_dir(storage.resolve(dir));
    }
    let web = ConfigPortal::new(portal);
    let uploader = config.upload.clone().map(|upload| -> Box<dyn UploadPort> {
        Box::new(BeepUploader::new(upload, platform::http_post()))
    });

    // ── 4. Run ────────────────────────────────────────────────
    let parts = Parts {
        boot_clock,
        cycle_clock: MonotonicClock::new(),
        sampler,
        sink,
        net,
        web,
        rtc: RtcAdapter::new(),
        sleeper: power,
        uploader,
        events: &EVENTS,
    };
    let mut scheduler = PowerCycleScheduler::new(Settings::from_config(&config), cause, parts);
    Ok(scheduler.run()?)
}

/// Durable CSV log if enabled and writable, console otherwise.
fn build_sink(storage: &Storage, config: &NodeConfig) -> Box<dyn LogSink> {
    let Some(dir) = &config.csv_dir else {
        return Box::new(ConsoleLogSink::new());
    };
    match FileLogSink::new(storage.resolve(dir)) {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            warn!("LogSink: {}, console only this boot", e);
            Box::new(ConsoleLogSink::new())
        }
    }
}

// ── Platform wiring ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod platform {
    use anyhow::Result;
    use esp_idf_hal::delay::{Ets, FreeRtos};
    use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, PinDriver};
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::onewire::OWDriver;
    use esp_idf_hal::prelude::Peripherals;
    use esp_idf_hal::units::Hertz;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::EspWifi;
    use log::warn;

    use hivemon::adapters::upload::EspHttpPost;
    use hivemon::adapters::wifi::WlanManager;
    use hivemon::config::{AccessPointConfig, NodeConfig};
    use hivemon::drivers::bme280::Bme280Climate;
    use hivemon::drivers::ds18b20::OneWireProbes;
    use hivemon::drivers::hx711::Hx711;
    use hivemon::drivers::status_led::StatusLed;
    use hivemon::pins;
    use hivemon::sensors::SensorHub;
    use hivemon::sensors::probe::PositionMap;

    pub fn build(config: &NodeConfig, access_point: AccessPointConfig) -> Result<(WlanManager, SensorHub<FreeRtos>)> {
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        let wifi = EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?;
        let net = WlanManager::new(wifi, sysloop, config.wlan.clone(), access_point, StatusLed::new())?;

        let mut hub = SensorHub::new(FreeRtos);

        if config.sensors.probes {
            // SAFETY: board pin from `pins`, not claimed by any other driver.
            let pin = unsafe { AnyIOPin::new(pins::ONEWIRE_GPIO) };
            match OWDriver::new(pin) {
                Ok(bus) => match OneWireProbes::new(bus) {
                    Ok(probes) => {
                        let positions = PositionMap::from_config(&config.sensors.probe_positions);
                        hub = hub.with_probes(Box::new(probes), positions);
                    }
                    Err(e) => warn!("Sensors: probe search failed: {}", e),
                },
                Err(e) => warn!("Sensors: one-wire bus unavailable: {}", e),
            }
        }

        if config.sensors.climate {
            // SAFETY: as above.
            let (sda, scl) = unsafe { (AnyIOPin::new(pins::I2C_SDA_GPIO), AnyIOPin::new(pins::I2C_SCL_GPIO)) };
            let i2c_conf = I2cConfig::new().baudrate(Hertz(pins::I2C_BAUDRATE_HZ));
            match I2cDriver::new(peripherals.i2c0, sda, scl, &i2c_conf) {
                Ok(i2c) => match Bme280Climate::new(i2c) {
                    Ok(sensor) => hub = hub.with_climate(Box::new(sensor)),
                    Err(e) => warn!("Sensors: BME280 not found: {}", e),
                },
                Err(e) => warn!("Sensors: I2C unavailable: {}", e),
            }
        }

        if config.sensors.scale {
            // SAFETY: as above.
            let (dout, sck) = unsafe {
                (
                    AnyInputPin::new(pins::HX711_DOUT_GPIO),
                    AnyOutputPin::new(pins::HX711_SCK_GPIO),
                )
            };
            let dout = PinDriver::input(dout)?;
            let sck = PinDriver::output(sck)?;
            match Hx711::new(dout, sck, Ets, config.sensors.scale_calibration) {
                Ok(cell) => hub = hub.with_scale(Box::new(cell)),
                Err(e) => warn!("Sensors: HX711 not ready: {}", e),
            }
        }

        Ok((net, hub))
    }

    pub fn http_post() -> EspHttpPost {
        EspHttpPost
    }
}

/// Host simulation: one probe per configured position, a climate sensor
/// and a scale with fixed readings, and a network that is reachable when
/// the client is enabled.
#[cfg(not(target_os = "espidf"))]
mod platform {
    use anyhow::Result;
    use log::warn;

    use hivemon::adapters::upload::SimHttpPost;
    use hivemon::adapters::wifi::WlanManager;
    use hivemon::config::{AccessPointConfig, NodeConfig};
    use hivemon::drivers::status_led::StatusLed;
    use hivemon::sensors::climate::SimClimate;
    use hivemon::sensors::probe::{PositionMap, ProbeAddress, SimProbeBus};
    use hivemon::sensors::scale::SimLoadCell;
    use hivemon::sensors::{SensorHub, StdDelay};

    const SIM_BROOD_CELSIUS: f32 = 34.5;
    const SIM_HIVE_KG: f32 = 42.0;

    pub fn build(config: &NodeConfig, access_point: AccessPointConfig) -> Result<(WlanManager, SensorHub<StdDelay>)> {
        let net = WlanManager::simulated(config.wlan.clone(), access_point, StatusLed::new(), config.wlan.enabled);
        let mut hub = SensorHub::new(StdDelay);

        if config.sensors.probes {
            let mut bus = SimProbeBus::new();
            for (position, addr) in &config.sensors.probe_positions {
                match addr.parse::<ProbeAddress>() {
                    Ok(rom) => bus = bus.with_probe(rom, Ok(SIM_BROOD_CELSIUS)),
                    Err(e) => warn!("Sensors(sim): {}: {}", position, e),
                }
            }
            let positions = PositionMap::from_config(&config.sensors.probe_positions);
            hub = hub.with_probes(Box::new(bus), positions);
        }
        if config.sensors.climate {
            hub = hub.with_climate(Box::new(SimClimate::default()));
        }
        if config.sensors.scale {
            hub = hub.with_scale(Box::new(SimLoadCell::new(Some(SIM_HIVE_KG))));
        }
        Ok((net, hub))
    }

    pub fn http_post() -> SimHttpPost {
        SimHttpPost::default()
    }
}
