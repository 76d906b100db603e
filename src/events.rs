//! Interrupt-to-main-loop event queue.
//!
//! Events are produced by:
//! - the access-point button ISR (rising edge, debounced)
//! - the web portal task (`/restart`, saved configuration)
//!
//! and consumed by the power-cycle scheduler at cycle boundaries, so
//! nothing outside the main loop ever touches the radio or the sensors.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────────┐
//! │ Button ISR  │────▶│  Event Queue │────▶│ PowerCycleScheduler│
//! │ Web task    │────▶│  (lock-free) │     │  (single consumer) │
//! └─────────────┘     └──────────────┘     └────────────────────┘
//! ```

use heapless::mpmc::Q8;

/// Events posted into the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The access-point button was pressed.
    AccessPointRequested,
    /// The web portal asked for a restart.
    RestartRequested,
    /// The web portal saved a configuration subsection.
    ConfigSaved,
}

/// Multi-producer queue: ISR context and the HTTP server task both push.
pub struct EventQueue {
    queue: Q8<Event>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self { queue: Q8::new() }
    }

    /// Push an event.  Safe from ISR context (lock-free CAS).
    /// Returns `false` if the queue is full and the event was dropped.
    pub fn push(&self, event: Event) -> bool {
        self.queue.enqueue(event).is_ok()
    }

    /// Pop the next event, `None` if empty.
    pub fn pop(&self) -> Option<Event> {
        self.queue.dequeue()
    }

    /// Drain all pending events into a callback, FIFO.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The device-wide queue the ISR and the web task post into.
pub static EVENTS: EventQueue = EventQueue::new();

/// Post into [`EVENTS`].  Callable from ISR context.
pub fn push_event(event: Event) -> bool {
    EVENTS.push(event)
}
