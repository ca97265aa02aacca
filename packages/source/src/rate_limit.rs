//! Client-side request quota.
//!
//! [`RateLimiter`] keeps the timestamps of recent requests and suspends the
//! caller until a new request fits inside a sliding window of
//! `requests_per_period` requests per `period`, with an additional minimum
//! gap between consecutive requests.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use uk_solicitors_config::RateLimitSettings;

/// Added to every window wait so the oldest request has surely expired.
const WINDOW_MARGIN: Duration = Duration::from_secs(1);

/// Sliding-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_period: usize,
    period: Duration,
    min_delay: Duration,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub const fn new(requests_per_period: usize, period: Duration, min_delay: Duration) -> Self {
        Self {
            requests_per_period,
            period,
            min_delay,
            timestamps: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(
            settings.requests_per_period,
            settings.period(),
            settings.min_delay(),
        )
    }

    #[must_use]
    pub const fn requests_per_period(&self) -> usize {
        self.requests_per_period
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub const fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Waits until another request may be issued, then records it.
    pub async fn wait_if_needed(&mut self) {
        let now = Instant::now();
        let period = self.period;
        self.timestamps
            .retain(|ts| now.saturating_duration_since(*ts) < period);

        if self.timestamps.len() >= self.requests_per_period
            && let Some(oldest) = self.timestamps.front()
        {
            let wait = (period + WINDOW_MARGIN).saturating_sub(now.duration_since(*oldest));
            if !wait.is_zero() {
                log::info!(
                    "Rate limit reached. Waiting {:.1} seconds...",
                    wait.as_secs_f64()
                );
                tokio::time::sleep(wait).await;
            }
        }

        if let Some(last) = self.timestamps.back() {
            let since_last = Instant::now().saturating_duration_since(*last);
            if since_last < self.min_delay {
                tokio::time::sleep(self.min_delay - since_last).await;
            }
        }

        self.timestamps.push_back(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sixth_request_waits_for_window() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(60), Duration::ZERO);
        let start = Instant::now();

        for _ in 0..5 {
            limiter.wait_if_needed().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        limiter.wait_if_needed().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert!(start.elapsed() <= Duration::from_secs(62));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_timestamps_free_the_window() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(10), Duration::ZERO);
        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;

        tokio::time::advance(Duration::from_secs(11)).await;
        let before = Instant::now();
        limiter.wait_if_needed().await;
        assert!(before.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn enforces_minimum_gap() {
        let mut limiter = RateLimiter::new(100, Duration::from_secs(60), Duration::from_millis(500));
        let start = Instant::now();

        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;

        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
