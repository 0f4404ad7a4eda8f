//! Injectable clock for the polling loop.
//!
//! Polling wall-clock behavior is driven through this trait so the state machine
//! can be tested against simulated time instead of real delays.

use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Time source and sleeper used by [`crate::ingest::IngestService::await_completion`].
#[async_trait]
pub trait PollClock: Send + Sync {
    /// Current instant, used to measure elapsed polling time.
    fn now(&self) -> Instant;

    /// Pause between poll attempts.
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer.
pub struct TokioClock;

#[async_trait]
impl PollClock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
