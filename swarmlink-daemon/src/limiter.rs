//! Rate limiter: a single shared gate between notification sends.
//!
//! Cooperative delay, not a reservation system — notification volume is low
//! and only spacing matters, not strict ordering.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    min_spacing: Duration,
    last_send: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_send: None,
        }
    }

    /// Wait until at least `min_spacing` has passed since the previous
    /// turn, then claim this turn.
    pub async fn await_turn(&mut self) {
        if let Some(last) = self.last_send {
            let elapsed = last.elapsed();
            if elapsed < self.min_spacing {
                tokio::time::sleep(self.min_spacing - elapsed).await;
            }
        }
        self.last_send = Some(Instant::now());
    }
}
