//! Mock port adapters for integration tests.
//!
//! All timing runs on a shared simulated clock: sampling and light sleep
//! advance it, so a whole boot (minutes of device time) runs instantly.
//! Every mock records its calls so tests can assert on the full history.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use hivemon::app::ports::{
    Clock, LightSleep, LogSink, NetworkGate, Sample, SensorFault, SensorSampler, TimeSync, UploadPort, WebEndpoint,
};
use hivemon::app::record::{LogEntry, MeasurementRecord};
use hivemon::error::{NetworkError, TimeSyncError, UploadError};
use hivemon::events::EventQueue;
use hivemon::power::{MeasurementInterval, ResetCause};
use hivemon::scheduler::{Parts, PowerCycleScheduler, Settings};

/// Unix time the mock NTP server hands out.
pub const NTP_TIME: i64 = 1_700_000_000;

// ── Simulated time ────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SimTime(Rc<Cell<Duration>>);

#[allow(dead_code)]
impl SimTime {
    pub fn now(&self) -> Duration {
        self.0.get()
    }

    pub fn advance(&self, d: Duration) {
        self.0.set(self.0.get() + d);
    }

    pub fn set(&self, d: Duration) {
        self.0.set(d);
    }
}

// ── Clock ─────────────────────────────────────────────────────

pub struct MockClock {
    time: SimTime,
    zero: Option<Duration>,
    pub starts: u32,
}

#[allow(dead_code)]
impl MockClock {
    pub fn new(time: &SimTime) -> Self {
        Self {
            time: time.clone(),
            zero: None,
            starts: 0,
        }
    }

    /// A clock whose zero point is simulated t = 0.
    pub fn started_at_zero(time: &SimTime) -> Self {
        Self {
            time: time.clone(),
            zero: Some(Duration::ZERO),
            starts: 0,
        }
    }
}

impl Clock for MockClock {
    fn start(&mut self) {
        self.zero = Some(self.time.now());
        self.starts += 1;
    }

    fn elapsed(&self) -> Duration {
        self.zero.map_or(Duration::ZERO, |z| self.time.now().saturating_sub(z))
    }
}

// ── Sampler ───────────────────────────────────────────────────

pub struct MockSampler {
    time: SimTime,
    /// How long one sampling pass takes.
    pub measure_time: Duration,
    pub record: MeasurementRecord,
    pub faults: Vec<SensorFault>,
    pub calls: u32,
}

impl MockSampler {
    pub fn new(time: &SimTime, measure_time: Duration) -> Self {
        let mut record = MeasurementRecord::new();
        record.insert("t", 21.5);
        record.insert("weight_kg", 42.0);
        Self {
            time: time.clone(),
            measure_time,
            record,
            faults: Vec::new(),
            calls: 0,
        }
    }
}

impl SensorSampler for MockSampler {
    fn sample(&mut self) -> Sample {
        self.calls += 1;
        self.time.advance(self.measure_time);
        Sample {
            record: self.record.clone(),
            faults: self.faults.clone(),
        }
    }
}

// ── Log sink ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Logged {
    Record(MeasurementRecord),
    Message(String),
}

#[derive(Default)]
pub struct RecordingSink {
    pub entries: Vec<Logged>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn records(&self) -> Vec<&MeasurementRecord> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                Logged::Record(r) => Some(r),
                Logged::Message(_) => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                Logged::Message(m) => Some(m.as_str()),
                Logged::Record(_) => None,
            })
            .collect()
    }

    pub fn has_message_starting(&self, prefix: &str) -> bool {
        self.messages().iter().any(|m| m.starts_with(prefix))
    }
}

impl LogSink for RecordingSink {
    fn log(&mut self, entry: LogEntry<'_>) {
        self.entries.push(match entry {
            LogEntry::Record(r) => Logged::Record(r.clone()),
            LogEntry::Message(m) => Logged::Message(m.to_owned()),
        });
    }
}

// ── Network gate ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetCall {
    EnableClient,
    EnableAccessPoint,
    DetachCellular,
    DeinitWireless,
}

#[derive(Default)]
pub struct MockNet {
    pub calls: Vec<NetCall>,
    pub ap: bool,
    pub client: bool,
    /// Whether enabling the client results in an association.
    pub reachable: bool,
    pub fail_access_point: bool,
}

#[allow(dead_code)]
impl MockNet {
    pub fn reachable() -> Self {
        Self {
            reachable: true,
            ..Self::default()
        }
    }

    pub fn count(&self, call: NetCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

impl NetworkGate for MockNet {
    fn enable_client(&mut self) -> Result<(), NetworkError> {
        self.calls.push(NetCall::EnableClient);
        self.client = self.reachable;
        Ok(())
    }

    fn enable_access_point(&mut self) -> Result<(), NetworkError> {
        self.calls.push(NetCall::EnableAccessPoint);
        if self.fail_access_point {
            return Err(NetworkError::Driver(-1));
        }
        self.ap = true;
        Ok(())
    }

    fn detach_cellular(&mut self) {
        self.calls.push(NetCall::DetachCellular);
    }

    fn deinit_wireless(&mut self) {
        self.calls.push(NetCall::DeinitWireless);
        self.ap = false;
        self.client = false;
    }

    fn is_access_point_mode(&self) -> bool {
        self.ap
    }

    fn is_client_connected(&self) -> bool {
        self.client
    }
}

// ── Web endpoint ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockWeb {
    pub started: bool,
    pub start_calls: u32,
}

impl WebEndpoint for MockWeb {
    fn start(&mut self) -> Result<(), NetworkError> {
        self.start_calls += 1;
        self.started = true;
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started
    }
}

// ── RTC ───────────────────────────────────────────────────────

pub struct MockRtc {
    pub now: Option<i64>,
    pub seeded: Vec<i64>,
    pub synced_with: Vec<String>,
    pub sync_result: Result<(), TimeSyncError>,
}

impl Default for MockRtc {
    fn default() -> Self {
        Self {
            now: None,
            seeded: Vec::new(),
            synced_with: Vec::new(),
            sync_result: Ok(()),
        }
    }
}

impl TimeSync for MockRtc {
    fn now_unix(&self) -> Option<i64> {
        self.now
    }

    fn seed_if_unset(&mut self, unix_secs: i64) -> bool {
        if self.now.is_some() {
            return false;
        }
        self.now = Some(unix_secs);
        self.seeded.push(unix_secs);
        true
    }

    fn sync(&mut self, server: &str) -> Result<(), TimeSyncError> {
        self.synced_with.push(server.to_owned());
        self.sync_result.clone()?;
        self.now = Some(NTP_TIME);
        Ok(())
    }
}

// ── Light sleep ───────────────────────────────────────────────

pub struct MockSleeper {
    time: SimTime,
    pub sleeps: Vec<Duration>,
    /// When false the sleep "returns immediately" and time stands still.
    pub advances_time: bool,
}

impl MockSleeper {
    pub fn new(time: &SimTime) -> Self {
        Self {
            time: time.clone(),
            sleeps: Vec::new(),
            advances_time: true,
        }
    }
}

impl LightSleep for MockSleeper {
    fn light_sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
        if self.advances_time {
            self.time.advance(duration);
        }
    }
}

// ── Uploader ──────────────────────────────────────────────────

/// Shared view of what reached the uploader.
#[derive(Clone, Default)]
pub struct UploadLog(pub Rc<RefCell<Vec<MeasurementRecord>>>);

#[allow(dead_code)]
impl UploadLog {
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }
}

pub struct MockUploader {
    pub log: UploadLog,
    pub fail: bool,
}

impl UploadPort for MockUploader {
    fn add(&mut self, record: &MeasurementRecord) -> Result<(), UploadError> {
        self.log.0.borrow_mut().push(record.clone());
        if self.fail {
            Err(UploadError::Transport("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

// ── Harness ───────────────────────────────────────────────────

pub type TestScheduler =
    PowerCycleScheduler<MockClock, MockSampler, RecordingSink, MockNet, MockWeb, MockRtc, MockSleeper>;

pub fn leak_queue() -> &'static EventQueue {
    Box::leak(Box::new(EventQueue::new()))
}

pub fn settings(interval_secs: f64) -> Settings {
    Settings {
        interval: MeasurementInterval::from_secs(interval_secs).unwrap(),
        window: Duration::from_secs(120),
        initial_time: 1_577_836_800,
        wlan_enabled: false,
        ntp_server: "pool.ntp.org".into(),
    }
}

/// Builder over the mocks with sensible defaults: power-on boot, 60 s
/// interval, 5 s measurement, wlan disabled.
pub struct Harness {
    pub time: SimTime,
    pub settings: Settings,
    pub cause: ResetCause,
    pub measure_time: Duration,
    pub net: MockNet,
    pub rtc: MockRtc,
    pub uploader: Option<Box<dyn UploadPort>>,
    pub events: &'static EventQueue,
    pub sleeper_advances_time: bool,
    /// Overrides the sampler's default record.
    pub record: Option<MeasurementRecord>,
    pub faults: Vec<SensorFault>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(cause: ResetCause) -> Self {
        Self {
            time: SimTime::default(),
            settings: settings(60.0),
            cause,
            measure_time: Duration::from_secs(5),
            net: MockNet::default(),
            rtc: MockRtc::default(),
            uploader: None,
            events: leak_queue(),
            sleeper_advances_time: true,
            record: None,
            faults: Vec::new(),
        }
    }

    pub fn interval(mut self, secs: f64) -> Self {
        self.settings.interval = MeasurementInterval::from_secs(secs).unwrap();
        self
    }

    pub fn measure_time(mut self, d: Duration) -> Self {
        self.measure_time = d;
        self
    }

    pub fn build(self) -> TestScheduler {
        let mut sleeper = MockSleeper::new(&self.time);
        sleeper.advances_time = self.sleeper_advances_time;
        let mut sampler = MockSampler::new(&self.time, self.measure_time);
        if let Some(record) = self.record {
            sampler.record = record;
        }
        sampler.faults = self.faults;
        let parts = Parts {
            boot_clock: MockClock::started_at_zero(&self.time),
            cycle_clock: MockClock::new(&self.time),
            sampler,
            sink: RecordingSink::default(),
            net: self.net,
            web: MockWeb::default(),
            rtc: self.rtc,
            sleeper,
            uploader: self.uploader,
            events: self.events,
        };
        PowerCycleScheduler::new(self.settings, self.cause, parts)
    }
}
