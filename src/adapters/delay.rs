//! Reactor-backed delay adapter.
//!
//! Implements [`Delay`] with an `async-io-mini` timer. The future must be
//! polled from a thread that drives the reactor (`futures_lite::future::block_on`
//! or an executor running under it).

use std::time::Duration;

use crate::app::ports::Delay;

/// Sleeps on the `async-io-mini` reactor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactorDelay;

impl Delay for ReactorDelay {
    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        async_io_mini::Timer::after(duration).await;
    }
}
