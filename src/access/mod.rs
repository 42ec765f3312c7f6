//! Time-windowed access gate for scheduled self-serve interviews
//!
//! The gate is a pure function of the server clock and the stored scheduled
//! time. Client-reported timezone offsets only shape the display fields of a
//! decision; they never move the window.

mod gate;

pub use gate::{AccessDecision, AccessWindow, DenyReason};
