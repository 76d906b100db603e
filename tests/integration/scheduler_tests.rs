//! Integration tests for the power-cycle scheduler against mock ports.
//!
//! Simulated time only moves when the sampler measures or the sleeper
//! sleeps, so each test replays a full boot deterministically.

use std::time::Duration;

use hivemon::app::ports::{SensorFault, SensorSource};
use hivemon::app::record::MeasurementRecord;
use hivemon::error::{Error, NetworkError, SensorError, TimeSyncError};
use hivemon::events::Event;
use hivemon::power::{BootOutcome, DEEP_SLEEP_DURATION, ResetCause, RestartReason};

use crate::mock_ports::{Harness, Logged, MockUploader, NTP_TIME, NetCall, UploadLog};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

// ── Startup: field access ─────────────────────────────────────

#[test]
fn every_cause_but_deep_sleep_wake_opens_field_access_once() {
    for cause in ResetCause::ALL {
        let mut s = Harness::new(cause).build();
        s.run().unwrap();

        let expected = usize::from(!cause.is_deep_sleep_wake());
        assert_eq!(s.net().count(NetCall::EnableAccessPoint), expected, "{cause}");
        assert_eq!(s.web().start_calls as usize, expected, "{cause}");
    }
}

#[test]
fn startup_banner_names_the_reset_cause() {
    let mut s = Harness::new(ResetCause::BrownOut).build();
    s.run().unwrap();
    assert_eq!(s.sink().messages()[0], "Starting from: BROWN_OUT");
}

#[test]
fn access_point_already_up_is_not_reenabled() {
    let mut h = Harness::new(ResetCause::PowerOn);
    h.net.ap = true;
    let mut s = h.build();
    s.run().unwrap();
    assert_eq!(s.net().count(NetCall::EnableAccessPoint), 0);
    assert!(s.web().started);
}

#[test]
fn access_point_driver_fault_is_fatal_and_logged() {
    let mut h = Harness::new(ResetCause::PowerOn);
    h.net.fail_access_point = true;
    let mut s = h.build();

    let err = s.run().unwrap_err();
    assert_eq!(err, Error::Network(NetworkError::Driver(-1)));
    assert!(s.sink().has_message_starting("fault: network"));
    assert_eq!(s.sampler().calls, 0);
}

// ── Startup: RTC and NTP ──────────────────────────────────────

#[test]
fn unset_rtc_is_seeded_from_initial_time() {
    let mut s = Harness::new(ResetCause::PowerOn).build();
    s.run().unwrap();
    assert_eq!(s.rtc().seeded, vec![1_577_836_800]);
}

#[test]
fn running_rtc_is_not_rewound_on_wake() {
    let mut h = Harness::new(ResetCause::DeepSleepWake);
    h.rtc.now = Some(1_650_000_000);
    let mut s = h.build();
    s.run().unwrap();
    assert!(s.rtc().seeded.is_empty());
    assert_eq!(s.rtc().now, Some(1_650_000_000));
}

#[test]
fn wlan_disabled_never_touches_the_client() {
    let mut s = Harness::new(ResetCause::PowerOn).build();
    s.run().unwrap();
    assert_eq!(s.net().count(NetCall::EnableClient), 0);
    assert!(s.rtc().synced_with.is_empty());
}

#[test]
fn associated_client_syncs_time_and_logs_before_and_after() {
    let mut h = Harness::new(ResetCause::PowerOn);
    h.settings.wlan_enabled = true;
    h.net = crate::mock_ports::MockNet::reachable();
    let mut s = h.build();
    s.run().unwrap();

    assert_eq!(s.rtc().synced_with, vec!["pool.ntp.org".to_owned()]);
    assert!(s.sink().messages().contains(&"Pre Time: 2019-01-01T00:00:00Z"));
    assert_eq!(s.rtc().now, Some(NTP_TIME));
    assert!(s.sink().messages().contains(&"Time: 2023-11-14T22:13:20Z"));
}

#[test]
fn unreachable_network_skips_time_sync() {
    let mut h = Harness::new(ResetCause::PowerOn);
    h.settings.wlan_enabled = true;
    let mut s = h.build();
    s.run().unwrap();
    assert_eq!(s.net().count(NetCall::EnableClient), 1);
    assert!(s.rtc().synced_with.is_empty());
}

#[test]
fn failed_time_sync_is_swallowed() {
    let mut h = Harness::new(ResetCause::PowerOn);
    h.settings.wlan_enabled = true;
    h.net = crate::mock_ports::MockNet::reachable();
    h.rtc.sync_result = Err(TimeSyncError::Timeout);
    let mut s = h.build();

    assert!(s.run().is_ok());
    assert!(s.sink().has_message_starting("Pre Time"));
    assert!(!s.sink().has_message_starting("Time:"));
    assert!(s.sampler().calls > 0);
}

// ── Cycle: record and log path ────────────────────────────────

#[test]
fn every_cycle_logs_exactly_one_record() {
    let mut s = Harness::new(ResetCause::PowerOn).build();
    s.run().unwrap();
    assert_eq!(s.sink().records().len() as u32, s.cycles());
    assert_eq!(s.sampler().calls, s.cycles());
}

#[test]
fn empty_record_with_faults_is_still_logged() {
    let mut h = Harness::new(ResetCause::DeepSleepWake).measure_time(secs(1));
    h.record = Some(MeasurementRecord::new());
    h.faults = vec![
        SensorFault {
            source: SensorSource::Climate,
            error: SensorError::NoResponse,
        },
        SensorFault {
            source: SensorSource::Scale,
            error: SensorError::NotReady,
        },
    ];
    let mut s = h.build();

    s.run().unwrap();
    let records = s.sink().records();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_empty());
    assert!(s.sink().messages().contains(&"climate sensor: no response"));
    assert!(s.sink().messages().contains(&"scale: conversion not ready"));
}

#[test]
fn faults_are_logged_before_the_record() {
    let mut h = Harness::new(ResetCause::DeepSleepWake);
    h.faults = vec![SensorFault {
        source: SensorSource::Probe("28ff000000000001".into()),
        error: SensorError::Crc,
    }];
    let mut s = h.build();
    s.run().unwrap();

    let fault_at = s
        .sink()
        .entries
        .iter()
        .position(|e| matches!(e, Logged::Message(m) if m.starts_with("probe 28ff")))
        .unwrap();
    let record_at = s
        .sink()
        .entries
        .iter()
        .position(|e| matches!(e, Logged::Record(_)))
        .unwrap();
    assert!(fault_at < record_at);
}

// ── Cycle: upload ─────────────────────────────────────────────

fn with_uploader(connected: bool, fail: bool) -> (crate::mock_ports::TestScheduler, UploadLog) {
    let log = UploadLog::default();
    let mut h = Harness::new(ResetCause::DeepSleepWake);
    h.settings.wlan_enabled = true;
    h.net.reachable = connected;
    h.uploader = Some(Box::new(MockUploader { log: log.clone(), fail }));
    (h.build(), log)
}

#[test]
fn connected_node_uploads_each_record() {
    let (mut s, log) = with_uploader(true, false);
    s.run().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(s.sink().records().len(), 1);
}

#[test]
fn offline_node_does_not_upload() {
    let (mut s, log) = with_uploader(false, false);
    s.run().unwrap();
    assert_eq!(log.len(), 0);
    assert_eq!(s.sink().records().len(), 1);
}

#[test]
fn upload_failure_never_fails_the_cycle() {
    let (mut s, log) = with_uploader(true, true);
    assert_eq!(s.run(), Ok(BootOutcome::DeepSleep(DEEP_SLEEP_DURATION)));
    assert_eq!(log.len(), 1);
    assert_eq!(s.sink().records().len(), 1);
}

// ── Sleep decision ────────────────────────────────────────────

#[test]
fn short_cycle_sleeps_the_rest_of_the_interval() {
    let mut s = Harness::new(ResetCause::PowerOn)
        .interval(10.0)
        .measure_time(secs(3))
        .build();
    s.run().unwrap();
    assert_eq!(s.sleeper().sleeps[0], secs(7));
}

#[test]
fn overrun_cycle_sleeps_the_overrun() {
    let mut s = Harness::new(ResetCause::PowerOn)
        .interval(10.0)
        .measure_time(secs(12))
        .build();
    s.run().unwrap();
    assert!(s.sleeper().sleeps.iter().all(|d| *d == secs(2)));
    assert!(!s.sleeper().sleeps.is_empty());
}

#[test]
fn inside_the_window_only_light_sleep() {
    let h = Harness::new(ResetCause::PowerOn);
    let time = h.time.clone();
    time.set(secs(40));
    let mut s = h.build();
    // Boot clock reads 40 s; the first cycle ends at 45 s.
    s.run().unwrap();

    assert!(!s.sleeper().sleeps.is_empty());
    // The last light sleep started before the window closed.
    let deep_at = s.sleeper().sleeps.len();
    assert_eq!(deep_at as u32 + 1, s.cycles());
    assert_eq!(s.net().count(NetCall::DeinitWireless), 1);
    assert!(time.now() >= secs(120));
}

#[test]
fn outside_the_window_deep_sleeps_for_the_fixed_duration() {
    let h = Harness::new(ResetCause::PowerOn).interval(600.0);
    h.time.set(secs(119));
    let mut s = h.build();

    // Remainder would be 595 s; the fixed duration wins.
    assert_eq!(s.run(), Ok(BootOutcome::DeepSleep(secs(10))));
    assert!(s.sleeper().sleeps.is_empty());
    assert_eq!(
        s.net().calls[s.net().calls.len() - 2..],
        [NetCall::DetachCellular, NetCall::DeinitWireless]
    );
}

#[test]
fn deep_sleep_wake_measures_once_then_sleeps_deep() {
    let mut s = Harness::new(ResetCause::DeepSleepWake).build();
    assert_eq!(s.run(), Ok(BootOutcome::DeepSleep(DEEP_SLEEP_DURATION)));
    assert_eq!(s.cycles(), 1);
    assert!(s.sleeper().sleeps.is_empty());
    assert!(!s.web().started);
}

#[test]
fn boot_clock_is_never_restarted_by_the_loop() {
    let mut s = Harness::new(ResetCause::PowerOn).build();
    s.run().unwrap();
    assert_eq!(s.boot_clock().starts, 0);
    assert!(s.cycles() > 1);
}

#[test]
fn stalled_boot_clock_trips_the_loop_bound() {
    let mut h = Harness::new(ResetCause::PowerOn).measure_time(Duration::ZERO);
    h.sleeper_advances_time = false;
    let mut s = h.build();

    // First reading sets the baseline, then three cycles without progress.
    assert_eq!(s.run(), Err(Error::UnexpectedLoopExit { cycles: 4 }));
    assert!(s.sink().has_message_starting("fault: measurement loop exited"));
}

#[test]
fn sub_second_interval_runs_the_window_out_to_deep_sleep() {
    // Each cycle sleeps the truncated remainder (99 ms) after 100 us of
    // work, so every cycle is a little short of the interval.
    let mut s = Harness::new(ResetCause::PowerOn)
        .interval(0.1)
        .measure_time(Duration::from_micros(100))
        .build();

    assert_eq!(s.run(), Ok(BootOutcome::DeepSleep(DEEP_SLEEP_DURATION)));
    assert!(s.cycles() > 1_200);
    assert!(s.sleeper().sleeps.iter().all(|d| *d == Duration::from_millis(99)));
}

// ── Events ────────────────────────────────────────────────────

#[test]
fn repeated_button_requests_enable_the_ap_once() {
    let h = Harness::new(ResetCause::DeepSleepWake);
    for _ in 0..5 {
        assert!(h.events.push(Event::AccessPointRequested));
    }
    let mut s = h.build();
    s.run().unwrap();

    assert_eq!(s.net().count(NetCall::EnableAccessPoint), 1);
    assert_eq!(s.web().start_calls, 1);
}

#[test]
fn button_request_with_ap_up_is_a_no_op() {
    let h = Harness::new(ResetCause::PowerOn);
    h.events.push(Event::AccessPointRequested);
    let mut s = h.build();
    s.run().unwrap();
    assert_eq!(s.net().count(NetCall::EnableAccessPoint), 1);
}

#[test]
fn restart_request_ends_the_boot_before_measuring() {
    let h = Harness::new(ResetCause::PowerOn);
    h.events.push(Event::RestartRequested);
    let mut s = h.build();

    assert_eq!(s.run(), Ok(BootOutcome::Restart(RestartReason::Requested)));
    assert_eq!(s.sampler().calls, 0);
    assert!(s.sink().messages().contains(&"restart requested"));
}

#[test]
fn config_saved_is_noted_in_the_log() {
    let h = Harness::new(ResetCause::DeepSleepWake);
    h.events.push(Event::ConfigSaved);
    let mut s = h.build();
    s.run().unwrap();
    assert!(s.sink().has_message_starting("configuration saved"));
}

// ── Scenario ──────────────────────────────────────────────────

#[test]
fn power_on_boot_stays_reachable_for_the_whole_window() {
    let h = Harness::new(ResetCause::PowerOn).interval(60.0).measure_time(secs(5));
    let time = h.time.clone();
    let mut s = h.build();

    assert_eq!(s.run(), Ok(BootOutcome::DeepSleep(DEEP_SLEEP_DURATION)));

    // t=0 AP up; t=5 first record, sleep 55; t=65 second, sleep 55;
    // t=125 third record, outside the window, deep sleep.
    assert_eq!(s.net().calls[0], NetCall::EnableAccessPoint);
    assert_eq!(s.sleeper().sleeps, vec![secs(55), secs(55)]);
    assert_eq!(s.sink().records().len(), 3);
    assert_eq!(time.now(), secs(125));
    assert_eq!(s.net().count(NetCall::DeinitWireless), 1);
    assert_eq!(*s.net().calls.last().unwrap(), NetCall::DeinitWireless);
}
