//! Access-point button, debounced in the ISR.
//!
//! ## Hardware
//!
//! Momentary switch with the internal pull-up enabled; the interrupt fires
//! on the rising edge.  A contact bounces for a few milliseconds, so edges
//! within [`DEBOUNCE_MS`] of the last accepted one are dropped.
//!
//! An accepted edge only posts [`Event::AccessPointRequested`]; the main
//! loop does the actual radio work at the next cycle boundary.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::events::{Event, EventQueue, EVENTS};

pub const DEBOUNCE_MS: u32 = 200;

/// Lock-free edge filter.  Written from a single ISR.
#[derive(Debug, Default)]
pub struct ButtonDebounce {
    last_accept_ms: AtomicU32,
    seen: AtomicBool,
}

impl ButtonDebounce {
    pub const fn new() -> Self {
        Self {
            last_accept_ms: AtomicU32::new(0),
            seen: AtomicBool::new(false),
        }
    }

    /// `true` if the edge at `now_ms` is a new press.
    pub fn accept(&self, now_ms: u32) -> bool {
        let fresh = !self.seen.load(Ordering::Acquire)
            || now_ms.wrapping_sub(self.last_accept_ms.load(Ordering::Acquire)) >= DEBOUNCE_MS;
        if fresh {
            self.last_accept_ms.store(now_ms, Ordering::Release);
            self.seen.store(true, Ordering::Release);
        }
        fresh
    }

    /// Filter an edge and post the request into `queue`.
    pub fn on_edge(&self, now_ms: u32, queue: &EventQueue) -> bool {
        self.accept(now_ms) && queue.push(Event::AccessPointRequested)
    }
}

static BUTTON: ButtonDebounce = ButtonDebounce::new();

/// ISR entry point.  Safe to call from interrupt context.
pub fn button_isr_handler(now_ms: u32) {
    let _ = BUTTON.on_edge(now_ms, &EVENTS);
}
