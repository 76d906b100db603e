//! End-to-end boot flows with the real host adapters.
//!
//! Configuration is parsed from JSON, the sensors are the simulation
//! backends behind a real `SensorHub`, the network is the simulated
//! `WlanManager`, the portal is the real `ConfigPortal`, and records land
//! in CSV files in a temp directory.  Only time is mocked.

use std::path::PathBuf;
use std::time::Duration;

use hivemon::adapters::log_sink::{FileLogSink, MEASUREMENTS_FILE, MESSAGES_FILE};
use hivemon::adapters::time::RtcAdapter;
use hivemon::adapters::web::{ConfigPortal, PortalMethod, PortalState};
use hivemon::adapters::wifi::{WlanManager, WlanMode};
use hivemon::app::ports::{NetworkGate, WebEndpoint};
use hivemon::config::{ConfigTree, NodeConfig};
use hivemon::drivers::status_led::{COLOUR_ACCESS_POINT, OFF, StatusLed};
use hivemon::error::SensorError;
use hivemon::events::Event;
use hivemon::power::{BootOutcome, ResetCause, RestartReason};
use hivemon::scheduler::{Parts, PowerCycleScheduler, Settings};
use hivemon::sensors::SensorHub;
use hivemon::sensors::climate::{ClimateReading, SimClimate};
use hivemon::sensors::probe::{PositionMap, ProbeAddress, SimProbeBus};
use hivemon::sensors::scale::SimLoadCell;

use crate::mock_ports::{MockClock, MockSleeper, SimTime, leak_queue};

const BROOD: &str = "28ff4a1b00000001";
const STRAY: &str = "28ff4a1b000000aa";

/// Zero-cost delay; the settle wait is asserted in the sensor unit tests.
struct NoDelay;

impl embedded_hal::delay::DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn config_json(wlan_enabled: bool) -> String {
    format!(
        r#"{{
        "general": {{ "general": {{
            "measurement_interval": 60.0,
            "button_ap_enabled": true,
            "button_ap_pin": 0,
            "initial_time": 1577836800
        }} }},
        "networking": {{
            "wlan": {{ "enabled": {wlan_enabled}, "ssid": "Apiary", "password": "apiary-secret" }},
            "accesspoint": {{ "ssid": "hivemon-1a2b3c", "password": "" }},
            "ntp": {{ "server": "pool.ntp.org" }}
        }},
        "sensors": {{
            "ds1820": {{ "enabled": true, "positions": {{ "brood": "{BROOD}" }} }},
            "bme280": {{ "enabled": true }},
            "hx711": {{ "enabled": true, "offset": 0.0, "counts_per_kg": 1.0 }}
        }},
        "logging": {{
            "csv": {{ "enabled": true, "dir": "log" }},
            "beep": {{ "enabled": false, "url": "", "key": "" }}
        }}
    }}"#
    )
}

fn sensors(config: &NodeConfig, climate_ok: bool) -> SensorHub<NoDelay> {
    let bus = SimProbeBus::new()
        .with_probe(BROOD.parse::<ProbeAddress>().unwrap(), Ok(34.5))
        .with_probe(STRAY.parse::<ProbeAddress>().unwrap(), Ok(12.0));
    let climate = if climate_ok {
        Ok(ClimateReading {
            celsius: 18.0,
            pascal: 101_325.0,
            humidity_pct: 61.0,
        })
    } else {
        Err(SensorError::NoResponse)
    };
    SensorHub::new(NoDelay)
        .with_probes(Box::new(bus), PositionMap::from_config(&config.sensors.probe_positions))
        .with_climate(Box::new(SimClimate::new(climate)))
        .with_scale(Box::new(SimLoadCell::new(Some(42.25))))
}

struct Node {
    scheduler: PowerCycleScheduler<
        MockClock,
        SensorHub<NoDelay>,
        FileLogSink,
        WlanManager,
        ConfigPortal,
        RtcAdapter,
        MockSleeper,
    >,
    log_dir: PathBuf,
    time: SimTime,
    events: &'static hivemon::events::EventQueue,
}

fn node(name: &str, cause: ResetCause, wlan_enabled: bool, climate_ok: bool) -> Node {
    let root = temp_dir(name);
    let tree = ConfigTree::from_json(&config_json(wlan_enabled)).unwrap();
    let config = NodeConfig::from_tree(&tree).unwrap();
    let log_dir = root.join(config.csv_dir.as_deref().unwrap());
    let events = leak_queue();
    let time = SimTime::default();

    let mut sleeper = MockSleeper::new(&time);
    sleeper.advances_time = true;

    let parts = Parts {
        boot_clock: MockClock::started_at_zero(&time),
        cycle_clock: MockClock::new(&time),
        sampler: sensors(&config, climate_ok),
        sink: FileLogSink::new(&log_dir).unwrap().with_clock(|| Some(1_700_000_000)),
        net: WlanManager::simulated(
            config.wlan.clone(),
            config.access_point.clone(),
            StatusLed::new(),
            true,
        ),
        web: ConfigPortal::new(
            PortalState::new(tree, root.join("config.json"), cause.label(), events).with_log_dir(&log_dir),
        ),
        rtc: RtcAdapter::new(),
        sleeper,
        uploader: None,
        events,
    };
    Node {
        scheduler: PowerCycleScheduler::new(Settings::from_config(&config), cause, parts),
        log_dir,
        time,
        events,
    }
}

fn read(path: PathBuf) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn power_on_boot_logs_to_csv_and_ends_in_deep_sleep() {
    let mut n = node("hivemon-flow-poweron", ResetCause::PowerOn, false, true);

    // Sampling with the sim hub takes no simulated time, so each cycle
    // sleeps the full interval: cycles at t=0, 60, 120.
    let outcome = n.scheduler.run().unwrap();
    assert_eq!(outcome, BootOutcome::DeepSleep(Duration::from_secs(10)));
    assert_eq!(n.scheduler.cycles(), 3);
    assert_eq!(n.time.now(), Duration::from_secs(120));

    let measurements = read(n.log_dir.join(MEASUREMENTS_FILE));
    let mut lines = measurements.lines();
    assert_eq!(lines.next(), Some("timestamp,field,value"));
    assert!(measurements.contains("2023-11-14T22:13:20Z,brood,34.5"));
    assert!(measurements.contains(",p,1013.25"));
    assert!(measurements.contains(",weight_kg,42.25"));
    // The unmapped probe is measured but never recorded.
    assert!(!measurements.contains(",12"));
    // brood, t, p, h, weight_kg per cycle.
    assert_eq!(measurements.lines().count(), 1 + 3 * 5);

    let messages = read(n.log_dir.join(MESSAGES_FILE));
    assert!(messages.contains("Starting from: PWRON"));
    assert!(messages.contains("enabled ap"));
    assert!(messages.contains("web endpoint started"));

    // Radios are down for deep sleep.
    assert_eq!(n.scheduler.net().mode(), WlanMode::Off);
    assert_eq!(n.scheduler.net().led().current_colour(), OFF);
    assert!(n.scheduler.net().cellular_detached());
}

#[test]
fn deep_sleep_wake_with_wlan_measures_once_without_the_ap() {
    let mut n = node("hivemon-flow-wake", ResetCause::DeepSleepWake, true, true);

    assert_eq!(n.scheduler.run(), Ok(BootOutcome::DeepSleep(Duration::from_secs(10))));
    assert_eq!(n.scheduler.cycles(), 1);
    assert!(!n.scheduler.web().is_started());
    assert!(n.scheduler.sleeper().sleeps.is_empty());

    let messages = read(n.log_dir.join(MESSAGES_FILE));
    assert!(!messages.contains("enabled ap"));
    assert!(messages.contains("Pre Time:"));
}

#[test]
fn climate_failure_omits_its_fields_and_is_logged() {
    let mut n = node("hivemon-flow-climate", ResetCause::DeepSleepWake, false, false);
    n.scheduler.run().unwrap();

    let measurements = read(n.log_dir.join(MEASUREMENTS_FILE));
    assert!(!measurements.contains(",t,"));
    assert!(!measurements.contains(",p,"));
    assert!(!measurements.contains(",h,"));
    assert!(measurements.contains(",brood,"));

    let messages = read(n.log_dir.join(MESSAGES_FILE));
    assert!(messages.contains("climate sensor: no response"));
}

#[test]
fn button_press_on_a_wake_boot_brings_up_ap_and_portal() {
    let mut n = node("hivemon-flow-button", ResetCause::DeepSleepWake, true, true);
    n.events.push(Event::AccessPointRequested);
    n.events.push(Event::AccessPointRequested);
    n.scheduler.run().unwrap();

    assert!(n.scheduler.web().is_started());
    let messages = read(n.log_dir.join(MESSAGES_FILE));
    assert_eq!(messages.matches("enabled ap").count(), 1);
}

#[test]
fn station_and_ap_coexist_during_the_window() {
    let mut n = node("hivemon-flow-mixed", ResetCause::PowerOn, true, true);
    n.scheduler.startup().unwrap();

    let net = n.scheduler.net();
    assert_eq!(net.mode(), WlanMode::Mixed);
    assert!(net.is_access_point_mode());
    assert!(net.is_client_connected());
    assert_eq!(net.led().current_colour(), COLOUR_ACCESS_POINT);
}

#[test]
fn portal_restart_request_ends_the_boot() {
    let mut n = node("hivemon-flow-restart", ResetCause::PowerOn, false, true);
    n.scheduler.startup().unwrap();

    let resp = n.scheduler.web().state().handle(PortalMethod::Post, "/restart", b"");
    assert_eq!(resp.status, 200);

    assert_eq!(n.scheduler.run(), Ok(BootOutcome::Restart(RestartReason::Requested)));
}

#[test]
fn portal_serves_faults_from_the_durable_log() {
    let mut n = node("hivemon-flow-portal-log", ResetCause::DeepSleepWake, false, false);
    n.scheduler.run().unwrap();

    let resp = n.scheduler.web().state().handle(PortalMethod::Get, "/api/log", b"");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["reset_cause"], "DEEPSLEEP");
    let logfile = resp.body["logfile"].as_str().unwrap();
    assert!(logfile.contains("Starting from: DEEPSLEEP"));
    assert!(logfile.contains("climate sensor: no response"));
}
