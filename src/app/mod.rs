//! Application core: pure domain logic, zero I/O.
//!
//! The measurement record, the port traits the power-cycle scheduler is
//! written against, and the guarded access-point transition shared by
//! the startup path and the button request path.  All interaction with
//! hardware happens through the traits in [`ports`].

pub mod access;
pub mod ports;
pub mod record;
