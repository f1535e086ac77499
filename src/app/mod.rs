//! Application core wiring.
//!
//! The protocol components talk to the outside world only through the
//! **port traits** in [`ports`]; [`service`] assembles them into the
//! caller-facing facade and [`events`] carries what they report.

pub mod events;
pub mod ports;
pub mod service;
