//! Adapters: concrete implementations of the port traits that do not
//! depend on a platform radio stack.
//!
//! | Adapter    | Implements | Connects to             |
//! |------------|------------|-------------------------|
//! | `delay`    | Delay      | `async-io-mini` timers  |
//! | `log_sink` | EventSink  | `log` facade            |
//!
//! Scanner and GATT adapters live with the platform integration.

pub mod delay;
pub mod log_sink;
