//! Log sinks: the durable CSV log and the serial console.
//!
//! [`FileLogSink`] appends to two files under its directory:
//!
//! | File              | Columns                   |
//! |-------------------|---------------------------|
//! | `measurements.csv`| `timestamp,field,value`   |
//! | `logging.csv`     | `timestamp,message`       |
//!
//! Timestamps are RFC 3339 UTC, or `-` while the RTC is unset.  A write
//! that fails goes to the console instead; the sink itself never fails.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat};
use log::{info, warn};

use crate::adapters::time::wall_clock_unix;
use crate::app::ports::LogSink;
use crate::app::record::{LogEntry, MeasurementRecord};
use crate::error::StorageError;

pub const MEASUREMENTS_FILE: &str = "measurements.csv";
pub const MESSAGES_FILE: &str = "logging.csv";

const MEASUREMENTS_HEADER: [&str; 3] = ["timestamp", "field", "value"];
const MESSAGES_HEADER: [&str; 2] = ["timestamp", "message"];

/// Wall-clock source, Unix seconds.
pub type WallClockFn = fn() -> Option<i64>;

/// RFC 3339 UTC, or `-` for an unset clock.
pub fn format_unix(secs: Option<i64>) -> String {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .map_or_else(|| "-".to_owned(), |dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

// ───────────────────────────────────────────────────────────────
// Console
// ───────────────────────────────────────────────────────────────

/// Writes every entry to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleLogSink;

impl ConsoleLogSink {
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for ConsoleLogSink {
    fn log(&mut self, entry: LogEntry<'_>) {
        match entry {
            LogEntry::Record(r) => info!("MEAS | {}", r),
            LogEntry::Message(m) => info!("LOG  | {}", m),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// CSV files
// ───────────────────────────────────────────────────────────────

pub struct FileLogSink {
    dir: PathBuf,
    clock: WallClockFn,
    console: ConsoleLogSink,
    /// Inside a run of failed writes; the warning is logged once per run.
    failing: bool,
}

impl FileLogSink {
    /// Create the log directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::CreateDir(format!("{}: {}", dir.display(), e)))?;
        info!("LogSink: writing CSV to {}", dir.display());
        Ok(Self {
            dir,
            clock: wall_clock_unix,
            console: ConsoleLogSink,
            failing: false,
        })
    }

    pub fn with_clock(mut self, clock: WallClockFn) -> Self {
        self.clock = clock;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn timestamp(&self) -> String {
        format_unix((self.clock)())
    }

    fn write_record(&self, record: &MeasurementRecord) -> Result<(), csv::Error> {
        let ts = self.timestamp();
        let rows: Vec<[String; 3]> = if record.is_empty() {
            vec![[ts, String::new(), String::new()]]
        } else {
            record
                .iter()
                .map(|(field, value)| [ts.clone(), field.to_owned(), value.to_string()])
                .collect()
        };
        append_rows(&self.dir.join(MEASUREMENTS_FILE), &MEASUREMENTS_HEADER, &rows)
    }

    fn write_message(&self, message: &str) -> Result<(), csv::Error> {
        let row = [self.timestamp(), message.to_owned()];
        append_rows(&self.dir.join(MESSAGES_FILE), &MESSAGES_HEADER, &[row])
    }
}

/// Append rows, writing `header` first when the file is new or empty.
fn append_rows<R>(path: &Path, header: &[&str], rows: &[R]) -> Result<(), csv::Error>
where
    R: AsRef<[String]>,
{
    let fresh = std::fs::metadata(path).map_or(true, |m| m.len() == 0);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if fresh {
        writer.write_record(header)?;
    }
    for row in rows {
        writer.write_record(row.as_ref())?;
    }
    writer.flush()?;
    Ok(())
}

impl LogSink for FileLogSink {
    fn log(&mut self, entry: LogEntry<'_>) {
        let result = match entry {
            LogEntry::Record(r) => self.write_record(r),
            LogEntry::Message(m) => self.write_message(m),
        };
        match result {
            Ok(()) => {
                if self.failing {
                    info!("LogSink: writes to {} recovered", self.dir.display());
                    self.failing = false;
                }
            }
            Err(e) => {
                if !self.failing {
                    warn!("LogSink: write to {} failed ({}), using console", self.dir.display(), e);
                    self.failing = true;
                }
                self.console.log(entry);
            }
        }
    }
}
