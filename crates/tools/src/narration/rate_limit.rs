/// Minimum-interval limiter for speech synthesis requests.
///
/// Every request to the synthesis service, retries included, calls
/// `acquire()` first. The call returns immediately when at least
/// `min_interval` has passed since the previous dispatch, otherwise it sleeps
/// out the remainder. The lock is held across that sleep so concurrent
/// callers queue up and each one sees the timestamp its predecessor wrote.
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default spacing between two synthesis requests.
pub const MIN_DISPATCH_INTERVAL: Duration = Duration::from_millis(800);

struct DispatchClock {
    min_interval: Duration,
    last_dispatch: Option<Instant>,
}

impl DispatchClock {
    /// How long to wait before the next dispatch may go out.
    fn wait_needed(&self, now: Instant) -> Option<Duration> {
        let last = self.last_dispatch?;
        let elapsed = now.saturating_duration_since(last);
        (elapsed < self.min_interval).then(|| self.min_interval - elapsed)
    }
}

pub struct SpeechRateLimiter(Mutex<DispatchClock>);

impl SpeechRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self(Mutex::new(DispatchClock {
            min_interval,
            last_dispatch: None,
        }))
    }

    /// Wait for a dispatch slot and record it. Returns the dispatch instant.
    pub async fn acquire(&self) -> Instant {
        let mut clock = self.0.lock().await;
        if let Some(wait) = clock.wait_needed(Instant::now()) {
            tokio::time::sleep(wait).await;
        }
        let now = Instant::now();
        clock.last_dispatch = Some(now);
        now
    }

    pub async fn last_dispatch(&self) -> Option<Instant> {
        self.0.lock().await.last_dispatch
    }
}

impl Default for SpeechRateLimiter {
    fn default() -> Self {
        Self::new(MIN_DISPATCH_INTERVAL)
    }
}
