//! Unified error types for the Hivemon firmware.
//!
//! A single `Error` enum that every fatal subsystem failure converts into,
//! so the boot driver has exactly one thing to match on before restarting.
//! Recoverable faults (a probe that did not answer, an NTP timeout, an
//! upload that could not reach the server) have their own types and never
//! reach this enum; they are logged and the cycle carries on.

use core::fmt;

use crate::drivers::hw_init::HwInitError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fatal condition in the firmware funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration is missing, malformed, or out of range.
    Config(ConfigError),
    /// Peripheral or driver initialisation failed.
    Init(HwInitError),
    /// The wireless driver reported a fault (not merely "not associated").
    Network(NetworkError),
    /// Durable storage could not be set up.
    Storage(StorageError),
    /// The boot clock stopped advancing, so the loop would never leave
    /// the field-access window.
    UnexpectedLoopExit { cycles: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(e) => write!(f, "init: {e}"),
            Self::Network(e) => write!(f, "network: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::UnexpectedLoopExit { cycles } => {
                write!(f, "measurement loop exited unexpectedly after {cycles} cycles")
            }
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `section/subsection/key` is not present.
    Missing(String),
    /// The value exists but has the wrong JSON type.
    WrongType { path: String, expected: &'static str },
    /// The value failed range validation.
    Invalid { path: String, reason: &'static str },
    /// The config file could not be read or written.
    Io(String),
    /// The config file is not valid JSON.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(path) => write!(f, "missing value {path}"),
            Self::WrongType { path, expected } => write!(f, "{path}: expected {expected}"),
            Self::Invalid { path, reason } => write!(f, "{path}: {reason}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        Self::Init(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Network errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The wireless driver rejected the configuration.
    Configure(i32),
    /// The wireless driver failed to start or stop.
    Driver(i32),
    /// The HTTP endpoint could not be started.
    WebServer(i32),
    /// Credentials do not fit the driver's limits.
    InvalidCredentials,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configure(rc) => write!(f, "wifi configuration rejected (rc={rc})"),
            Self::Driver(rc) => write!(f, "wifi driver fault (rc={rc})"),
            Self::WebServer(rc) => write!(f, "web endpoint failed to start (rc={rc})"),
            Self::InvalidCredentials => write!(f, "SSID or password out of range"),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Mounting the SD card / flash filesystem failed.
    Mount(i32),
    /// Creating the log directory failed.
    CreateDir(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mount(rc) => write!(f, "filesystem mount failed (rc={rc})"),
            Self::CreateDir(path) => write!(f, "cannot create {path}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Recoverable errors (never converted into `Error`)
// ---------------------------------------------------------------------------

/// A single sensor read failed.  Isolated to that sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The device did not answer on its bus.
    NoResponse,
    /// The bus transaction failed a CRC / framing check.
    Crc,
    /// The device answered with a value outside its physical range.
    OutOfRange,
    /// The conversion did not finish within the settle time.
    NotReady,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse => write!(f, "no response"),
            Self::Crc => write!(f, "CRC mismatch"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::NotReady => write!(f, "conversion not ready"),
        }
    }
}

impl std::error::Error for SensorError {}

/// Time synchronisation failed; the RTC keeps its previous value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSyncError {
    /// The SNTP service could not be started.
    Start(i32),
    /// No answer from the time server within the allotted time.
    Timeout,
    /// Setting the system clock failed.
    SetClock(i32),
}

impl fmt::Display for TimeSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start(rc) => write!(f, "SNTP start failed (rc={rc})"),
            Self::Timeout => write!(f, "time server did not answer"),
            Self::SetClock(rc) => write!(f, "settimeofday failed (rc={rc})"),
        }
    }
}

impl std::error::Error for TimeSyncError {}

/// The best-effort upload could not deliver a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// No network route (not associated).
    Offline,
    /// The HTTP exchange failed before a status was received.
    Transport(String),
    /// The server answered with a non-success status.
    Status(u16),
    /// The record could not be serialised.
    Encode,
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => write!(f, "offline"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Status(code) => write!(f, "server answered HTTP {code}"),
            Self::Encode => write!(f, "record encoding failed"),
        }
    }
}

impl std::error::Error for UploadError {}
