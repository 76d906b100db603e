//! Remote collector upload (BEEP-style sensor API).
//!
//! Implements [`UploadPort`].  Each record becomes one JSON object
//!
//! ```json
//! {"key": "<device key>", "t": 21.5, "weight_kg": 42.1, ...}
//! ```
//!
//! POSTed to the configured URL.  Records wait in a bounded queue
//! ([`QUEUE_DEPTH`], oldest dropped) so a short outage loses nothing;
//! a failed POST stops the flush and leaves the rest for the next cycle.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`EspHttpPost`] over `EspHttpConnection`
//!   with the certificate bundle attached.
//! - **all other targets**: [`SimHttpPost`] records bodies in memory.

use heapless::Deque;
use log::{debug, info, warn};
use serde_json::{Map, Number, Value};

use crate::app::ports::UploadPort;
use crate::app::record::MeasurementRecord;
use crate::config::UploadConfig;
use crate::error::UploadError;

#[cfg(target_os = "espidf")]
use embedded_svc::{
    http::{Method, client::Client as HttpClient},
    io::Write,
};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::client::{Configuration as HttpClientConfiguration, EspHttpConnection};

pub const QUEUE_DEPTH: usize = 8;

/// Bounds how long an unreachable collector holds up one cycle.
#[cfg(target_os = "espidf")]
const HTTP_TIMEOUT: core::time::Duration = core::time::Duration::from_secs(3);

/// One-shot JSON POST.  Returns the HTTP status.
pub trait HttpPost {
    fn post_json(&mut self, url: &str, body: &[u8]) -> Result<u16, UploadError>;
}

/// Serialise `record` with the device key.  Non-finite values are skipped.
pub fn encode(key: &str, record: &MeasurementRecord) -> Result<Vec<u8>, UploadError> {
    let mut obj = Map::new();
    obj.insert("key".into(), Value::String(key.to_owned()));
    for (field, value) in record.iter() {
        if let Some(n) = Number::from_f64(f64::from(value)) {
            obj.insert(field.to_owned(), Value::Number(n));
        }
    }
    serde_json::to_vec(&Value::Object(obj)).map_err(|_| UploadError::Encode)
}

pub struct BeepUploader<H: HttpPost> {
    config: UploadConfig,
    http: H,
    pending: Deque<MeasurementRecord, QUEUE_DEPTH>,
}

impl<H: HttpPost> BeepUploader<H> {
    pub fn new(config: UploadConfig, http: H) -> Self {
        Self {
            config,
            http,
            pending: Deque::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    pub fn http_mut(&mut self) -> &mut H {
        &mut self.http
    }

    fn enqueue(&mut self, record: MeasurementRecord) {
        if self.pending.is_full() {
            let _ = self.pending.pop_front();
            warn!("Upload: queue full, oldest record dropped");
        }
        let _ = self.pending.push_back(record);
    }

    /// Send queued records oldest-first until one fails.
    fn flush(&mut self) -> Result<(), UploadError> {
        while let Some(record) = self.pending.front() {
            let body = encode(&self.config.key, record)?;
            match self.http.post_json(&self.config.url, &body)? {
                s if (200..300).contains(&s) => {
                    let _ = self.pending.pop_front();
                    debug!("Upload: record accepted ({})", s);
                }
                s => return Err(UploadError::Status(s)),
            }
        }
        Ok(())
    }
}

impl<H: HttpPost> UploadPort for BeepUploader<H> {
    fn add(&mut self, record: &MeasurementRecord) -> Result<(), UploadError> {
        self.enqueue(record.clone());
        let result = self.flush();
        if let Err(e) = &result {
            info!("Upload: {} record(s) held back: {}", self.pending.len(), e);
        }
        result
    }
}

// ───────────────────────────────────────────────────────────────
// Transports
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
#[derive(Debug, Default)]
pub struct EspHttpPost;

#[cfg(target_os = "espidf")]
impl HttpPost for EspHttpPost {
    fn post_json(&mut self, url: &str, body: &[u8]) -> Result<u16, UploadError> {
        let transport = |e: &dyn core::fmt::Debug| UploadError::Transport(format!("{e:?}"));

        let conf = HttpClientConfiguration {
            timeout: Some(HTTP_TIMEOUT),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let mut client = HttpClient::wrap(EspHttpConnection::new(&conf).map_err(|e| transport(&e))?);

        let len = body.len().to_string();
        let headers = [("Content-Type", "application/json"), ("Content-Length", len.as_str())];
        let mut request = client.request(Method::Post, url, &headers).map_err(|e| transport(&e))?;
        request.write_all(body).map_err(|e| transport(&e))?;
        request.flush().map_err(|e| transport(&e))?;
        let response = request.submit().map_err(|e| transport(&e))?;
        Ok(response.status())
    }
}

/// In-memory transport.  Answers with `status` and keeps every body sent.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug)]
pub struct SimHttpPost {
    pub status: Result<u16, UploadError>,
    pub sent: Vec<Vec<u8>>,
    pub attempts: u32,
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimHttpPost {
    fn default() -> Self {
        Self {
            status: Ok(200),
            sent: Vec::new(),
            attempts: 0,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl HttpPost for SimHttpPost {
    fn post_json(&mut self, url: &str, body: &[u8]) -> Result<u16, UploadError> {
        self.attempts += 1;
        let status = self.status.clone()?;
        debug!("Upload(sim): POST {} ({} bytes) -> {}", url, body.len(), status);
        if (200..300).contains(&status) {
            self.sent.push(body.to_vec());
        }
        Ok(status)
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
