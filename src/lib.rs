//! Auracast broadcast assistant core.
//!
//! Discovers broadcast audio sources from their advertisements, keeps a
//! merged per-device view of their streams, and drives a scan delegator
//! over its control point to join or switch streams.
//!
//! Radio access goes through the traits in [`app::ports`]; everything in
//! this crate runs on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod scan;
pub mod selection;
pub mod transport;

pub use app::service::BroadcastService;
pub use config::AuracastConfig;
pub use protocol::PeerAddress;
