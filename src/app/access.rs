//! Field-access transition: bring up the access point and the web portal.
//!
//! Reached from two places: unconditionally at startup for every boot
//! that is not a deep-sleep wake, and whenever the access-point button
//! posts a request.  Both calls are idempotent; the [`TransitionLatch`]
//! additionally makes a call that arrives while a transition is already
//! in flight a no-op instead of a second, interleaved bring-up.

use core::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::app::ports::{LogSink, NetworkGate, WebEndpoint};
use crate::error::NetworkError;

/// Single-owner flag around the AP/web bring-up.
#[derive(Debug, Default)]
pub struct TransitionLatch {
    busy: AtomicBool,
}

impl TransitionLatch {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Claim the latch.  `None` if another transition holds it.
    pub fn try_acquire(&self) -> Option<LatchGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| LatchGuard { busy: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the latch on drop, including on an early `?` return.
#[derive(Debug)]
pub struct LatchGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// What [`enable_field_access`] actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    /// At least one of AP / web portal was brought up.
    Enabled,
    /// Both were already running.
    AlreadyActive,
    /// Another transition holds the latch; nothing was touched.
    Busy,
}

/// Enable the access point (if not already in AP mode) and start the web
/// portal (if not already started).
pub fn enable_field_access(
    latch: &TransitionLatch,
    net: &mut impl NetworkGate,
    web: &mut impl WebEndpoint,
    sink: &mut impl LogSink,
) -> Result<AccessOutcome, NetworkError> {
    let Some(_guard) = latch.try_acquire() else {
        info!("FieldAccess: transition already in flight");
        return Ok(AccessOutcome::Busy);
    };

    let mut changed = false;

    if !net.is_access_point_mode() {
        sink.message("enabled ap");
        net.enable_access_point()?;
        changed = true;
    }

    if !web.is_started() {
        web.start()?;
        sink.message("web endpoint started");
        changed = true;
    }

    Ok(if changed {
        AccessOutcome::Enabled
    } else {
        AccessOutcome::AlreadyActive
    })
}
