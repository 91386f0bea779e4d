//! Sliding-window call throttle shared by every request an adapter makes

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Allows at most `max_calls` acquisitions within any trailing `period`
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, period: Duration) -> Self {
        let max_calls = max_calls.max(1);
        Self {
            max_calls,
            period,
            window: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    pub fn per_minute(max_calls: usize) -> Self {
        Self::new(max_calls, Duration::from_secs(60))
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Calls recorded within the trailing window
    pub async fn calls_in_window(&self) -> usize {
        let window = self.window.lock().await;
        let now = Instant::now();
        window
            .iter()
            .filter(|stamp| now.duration_since(**stamp) < self.period)
            .count()
    }

    /// Wait until a call fits in the window, then record it
    ///
    /// The window lock is held while sleeping so waiters are served in order.
    pub async fn acquire(&self) {
        let mut window = self.window.lock().await;
        loop {
            let now = Instant::now();
            while let Some(&oldest) = window.front() {
                if now.duration_since(oldest) >= self.period {
                    window.pop_front();
                } else {
                    break;
                }
            }

            if window.len() < self.max_calls {
                break;
            }

            if let Some(&oldest) = window.front() {
                let ready_at = oldest + self.period;
                debug!(
                    "Rate limit reached ({} calls / {:?}), waiting {:?}",
                    self.max_calls,
                    self.period,
                    ready_at.saturating_duration_since(now)
                );
                sleep_until(ready_at).await;
            }
        }
        window.push_back(Instant::now());
    }
}
