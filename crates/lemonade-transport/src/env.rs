//! Environment abstraction for time.
//!
//! The request timeout in the client and the timestamps on payment notices
//! both read time through `Environment`, so tests can run on a paused clock
//! without touching the wall clock.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - `unix_millis()` is wall-clock time and only used for display stamps

use std::{
    fmt,
    future::Future,
    ops::Sub,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Abstract environment providing time and async sleeping.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type.
    type Instant: Copy + Ord + Send + Sync + fmt::Debug + Sub<Output = Duration>;

    /// Returns the current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Milliseconds since the Unix epoch.
    fn unix_millis(&self) -> u64;
}

/// Production environment backed by the tokio clock.
///
/// Uses `tokio::time::Instant` rather than `std::time::Instant` so that a
/// paused tokio runtime also pauses request timeouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn unix_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |since| u64::try_from(since.as_millis()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_millis_is_after_2020() {
        let env = SystemEnv::new();
        assert!(env.unix_millis() > 1_577_836_800_000);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_paused_clock() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_secs(30)).await;
        let elapsed = env.now() - start;

        assert!(elapsed >= Duration::from_secs(30), "Sleep should wait at least 30s");
    }
}
