//! Channel configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Real-time channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket endpoint; the user id is appended as a query parameter
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Reconnect policy applied on unexpected close
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Outbound queue depth; sends beyond it are dropped, not blocked
    #[serde(default = "default_send_queue")]
    pub send_queue: usize,
}

fn default_endpoint() -> String {
    "ws://localhost:8000/chat/ws".to_string()
}

fn default_send_queue() -> usize {
    64
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            reconnect: ReconnectConfig::default(),
            send_queue: default_send_queue(),
        }
    }
}

impl RealtimeConfig {
    /// Set the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// Exponential backoff policy for socket reconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Attempts before giving up and surfacing a terminal close
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Cap on the delay between retries
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Multiplier for exponential growth
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl ReconnectConfig {
    /// Set maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay for a given attempt number (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay_ms = base.min(self.max_delay_ms as f64) as u64;

        let final_ms = if self.jitter {
            // Up to 25% jitter
            delay_ms + rand_jitter(delay_ms / 4)
        } else {
            delay_ms
        };

        Duration::from_millis(final_ms)
    }
}

/// Simple pseudo-random jitter (avoids pulling in a rand dependency)
fn rand_jitter(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    nanos % max
}

/// Legacy polling channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Base URL of the legacy chat REST backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Refresh period for the selected group's history
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PollingConfig {
    /// Set the backend base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Refresh period as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PollingConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(3));

        let config = RealtimeConfig::default();
        assert_eq!(config.send_queue, 64);
        assert!(config.reconnect.jitter);
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let config = ReconnectConfig::default().with_jitter(false);
        assert_eq!(config.delay_for(1), Duration::from_millis(500));
        assert_eq!(config.delay_for(2), Duration::from_millis(1_000));
        assert_eq!(config.delay_for(3), Duration::from_millis(2_000));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = ReconnectConfig::default().with_jitter(false);
        assert_eq!(config.delay_for(30), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = ReconnectConfig::default();
        for attempt in 1..=5 {
            let base = config.clone().with_jitter(false).delay_for(attempt);
            let jittered = config.delay_for(attempt);
            assert!(jittered >= base);
            assert!(jittered <= base + base / 4 + Duration::from_millis(1));
        }
    }
}
