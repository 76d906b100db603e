//! Field configuration portal.
//!
//! Implements [`WebEndpoint`].  The portal is a thin JSON API over the
//! [`ConfigTree`] served while the access point is up:
//!
//! | Method     | Path                                   | Effect                       |
//! |------------|----------------------------------------|------------------------------|
//! | GET        | `/api/config`                          | whole tree                   |
//! | GET        | `/api/config/<section>/<subsection>`   | one subsection               |
//! | POST       | `/api/config/<section>/<subsection>`   | replace subsection and save  |
//! | GET        | `/api/log`                             | reset cause and message log  |
//! | GET / POST | `/restart`                             | request a restart            |
//!
//! Request handling lives in [`PortalState::handle`] so it runs unchanged
//! on the host.  Handlers only post [`Event`]s; the main loop acts on them
//! at the next cycle boundary.

use std::fs::File;
use std::io::{Read as _, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};
use serde_json::{Value, json};

use crate::adapters::log_sink::MESSAGES_FILE;
use crate::app::ports::WebEndpoint;
use crate::config::ConfigTree;
use crate::error::NetworkError;
use crate::events::{Event, EventQueue};

#[cfg(target_os = "espidf")]
use embedded_svc::{
    http::Method,
    io::{Read, Write},
};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpServer};

/// Largest accepted POST body.
pub const MAX_BODY: usize = 4096;

/// Most of the message log `/api/log` returns; older lines are cut.
pub const MAX_LOGFILE: u64 = 16 * 1024;

// ───────────────────────────────────────────────────────────────
// Routing
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    Config,
    Subsection { section: &'a str, subsection: &'a str },
    Log,
    Restart,
    NotFound,
}

pub fn route(path: &str) -> Route<'_> {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    let path = path.trim_end_matches('/');
    match path {
        "/api/config" => Route::Config,
        "/api/log" => Route::Log,
        "/restart" => Route::Restart,
        _ => {
            let Some(rest) = path.strip_prefix("/api/config/") else {
                return Route::NotFound;
            };
            match rest.split_once('/') {
                Some((section, subsection))
                    if !section.is_empty() && !subsection.is_empty() && !subsection.contains('/') =>
                {
                    Route::Subsection { section, subsection }
                }
                _ => Route::NotFound,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortalResponse {
    pub status: u16,
    pub body: Value,
}

impl PortalResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Shared handler state
// ───────────────────────────────────────────────────────────────

/// Everything a request handler may touch.  Cloned into each handler.
#[derive(Clone)]
pub struct PortalState {
    tree: Arc<Mutex<ConfigTree>>,
    config_path: PathBuf,
    reset_label: &'static str,
    events: &'static EventQueue,
    log_dir: Option<PathBuf>,
}

impl PortalState {
    pub fn new(
        tree: ConfigTree,
        config_path: impl Into<PathBuf>,
        reset_label: &'static str,
        events: &'static EventQueue,
    ) -> Self {
        Self {
            tree: Arc::new(Mutex::new(tree)),
            config_path: config_path.into(),
            reset_label,
            events,
            log_dir: None,
        }
    }

    /// Serve the durable message log from `dir` on `/api/log`.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Tail of the message log, or why it could not be read.
    fn logfile(&self) -> String {
        let Some(dir) = &self.log_dir else {
            return "CSV logging is disabled".to_owned();
        };
        read_tail(&dir.join(MESSAGES_FILE), MAX_LOGFILE)
            .unwrap_or_else(|e| format!("Could not open logfile: {e}"))
    }

    /// Snapshot of the current tree.
    pub fn tree(&self) -> ConfigTree {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn handle(&self, method: PortalMethod, path: &str, body: &[u8]) -> PortalResponse {
        match (method, route(path)) {
            (PortalMethod::Get, Route::Config) => PortalResponse::ok(self.tree().as_value().clone()),
            (PortalMethod::Get, Route::Subsection { section, subsection }) => {
                let tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
                match tree.get_subsection(section, subsection) {
                    Some(v) => PortalResponse::ok(v.clone()),
                    None => PortalResponse::error(404, format!("no such subsection {section}/{subsection}")),
                }
            }
            (PortalMethod::Post, Route::Subsection { section, subsection }) => {
                self.update_subsection(section, subsection, body)
            }
            (PortalMethod::Get, Route::Log) => PortalResponse::ok(json!({
                "reset_cause": self.reset_label,
                "logfile": self.logfile(),
            })),
            (_, Route::Restart) => {
                if !self.events.push(Event::RestartRequested) {
                    warn!("Web: event queue full, restart request dropped");
                    return PortalResponse::error(503, "busy");
                }
                PortalResponse::ok(json!({ "restarting": true }))
            }
            (_, Route::NotFound) => PortalResponse::error(404, "not found"),
            _ => PortalResponse::error(405, "method not allowed"),
        }
    }

    fn update_subsection(&self, section: &str, subsection: &str, body: &[u8]) -> PortalResponse {
        if body.len() > MAX_BODY {
            return PortalResponse::error(413, "body too large");
        }
        let value: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => return PortalResponse::error(400, format!("invalid JSON: {e}")),
        };

        let mut tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = tree.set_subsection(section, subsection, value) {
            return PortalResponse::error(400, e.to_string());
        }
        if let Err(e) = tree.save(&self.config_path) {
            warn!("Web: saving {} failed: {}", self.config_path.display(), e);
            return PortalResponse::error(500, e.to_string());
        }
        drop(tree);

        info!("Web: {}/{} updated", section, subsection);
        let _ = self.events.push(Event::ConfigSaved);
        PortalResponse::ok(json!({ "saved": format!("{section}/{subsection}") }))
    }
}

/// Last `max` bytes of `path`, starting at a line boundary when cut.
fn read_tail(path: &std::path::Path, max: u64) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let cut = len > max;
    if cut {
        file.seek(SeekFrom::Start(len - max))?;
    }
    let mut buf = Vec::new();
    file.take(max).read_to_end(&mut buf)?;
    let text = String::from_utf8_lossy(&buf);
    let text: &str = if cut {
        text.split_once('\n').map_or("", |(_, rest)| rest)
    } else {
        &text
    };
    Ok(text.to_owned())
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct ConfigPortal {
    state: PortalState,
    #[cfg(target_os = "espidf")]
    server: Option<EspHttpServer<'static>>,
    #[cfg(not(target_os = "espidf"))]
    started: bool,
}

impl ConfigPortal {
    pub fn new(state: PortalState) -> Self {
        Self {
            state,
            #[cfg(target_os = "espidf")]
            server: None,
            #[cfg(not(target_os = "espidf"))]
            started: false,
        }
    }

    pub fn state(&self) -> &PortalState {
        &self.state
    }
}

#[cfg(target_os = "espidf")]
type EspRequest<'r, 'c> = esp_idf_svc::http::server::Request<&'r mut esp_idf_svc::http::server::EspHttpConnection<'c>>;

#[cfg(target_os = "espidf")]
fn serve(mut req: EspRequest<'_, '_>, state: &PortalState, method: PortalMethod) -> anyhow::Result<()> {
    let uri = req.uri().to_owned();
    let mut body = Vec::new();
    if method == PortalMethod::Post {
        let len = usize::try_from(req.content_len().unwrap_or(0)).unwrap_or(usize::MAX);
        if len > MAX_BODY {
            req.into_status_response(413)?;
            return Ok(());
        }
        body.resize(len, 0);
        req.read_exact(&mut body)?;
    }

    let resp = state.handle(method, &uri, &body);
    let bytes = serde_json::to_vec(&resp.body)?;
    req.into_response(resp.status, None, &[("Content-Type", "application/json; charset=utf-8")])?
        .write_all(&bytes)?;
    Ok(())
}

impl WebEndpoint for ConfigPortal {
    #[cfg(target_os = "espidf")]
    fn start(&mut self) -> Result<(), NetworkError> {
        if self.server.is_some() {
            return Ok(());
        }
        let conf = HttpConfiguration {
            stack_size: 16 * 1024,
            uri_match_wildcard: true,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&conf).map_err(|e| NetworkError::WebServer(e.code()))?;

        for (path, method, portal_method) in [
            ("/api/*", Method::Get, PortalMethod::Get),
            ("/api/*", Method::Post, PortalMethod::Post),
            ("/restart", Method::Get, PortalMethod::Get),
            ("/restart", Method::Post, PortalMethod::Post),
        ] {
            let state = self.state.clone();
            server
                .fn_handler::<anyhow::Error, _>(path, method, move |req| serve(req, &state, portal_method))
                .map_err(|e| NetworkError::WebServer(e.code()))?;
        }

        self.server = Some(server);
        info!("Web: portal listening");
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn is_started(&self) -> bool {
        self.server.is_some()
    }

    #[cfg(not(target_os = "espidf"))]
    fn start(&mut self) -> Result<(), NetworkError> {
        if !self.started {
            info!("Web(sim): portal listening");
            self.started = true;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_started(&self) -> bool {
        self.started
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
