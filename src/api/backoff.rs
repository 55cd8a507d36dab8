// src/api/backoff.rs
//! Retry delay policy and HTTP error classification shared by the oracle
//! clients and the price batcher.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error classification for HTTP-backed upstreams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiErrorType {
    RateLimit,          // 429 Too Many Requests
    Unauthorized,       // 401 / 403
    ServiceUnavailable, // 503
    BadGateway,         // 502
    Timeout,            // Request timeout
    NetworkError,       // Connection failures
    InvalidRequest,     // 400
    InternalError,      // other 5xx
    Unknown,
}

impl ApiErrorType {
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ApiErrorType::RateLimit,
            401 | 403 => ApiErrorType::Unauthorized,
            400 => ApiErrorType::InvalidRequest,
            502 => ApiErrorType::BadGateway,
            503 => ApiErrorType::ServiceUnavailable,
            500..=599 => ApiErrorType::InternalError,
            _ => ApiErrorType::Unknown,
        }
    }

    /// Whether trying the next endpoint of the same service makes sense.
    pub fn should_failover(&self) -> bool {
        matches!(
            self,
            ApiErrorType::RateLimit
                | ApiErrorType::ServiceUnavailable
                | ApiErrorType::BadGateway
                | ApiErrorType::InternalError
                | ApiErrorType::Timeout
                | ApiErrorType::NetworkError
        )
    }
}

/// Exponential backoff: `base_delay * backoff_multiplier^attempt`, capped at
/// `max_delay`, with optional symmetric jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffStrategy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_percent: f64, // 0.0 - 1.0
    pub enable_jitter: bool,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            jitter_percent: 0.1,
            enable_jitter: false,
        }
    }
}

impl BackoffStrategy {
    pub fn exponential(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, jitter_percent: f64) -> Self {
        self.jitter_percent = jitter_percent.clamp(0.0, 1.0);
        self.enable_jitter = true;
        self
    }

    /// Delay before retry number `attempt + 1`; attempt 0 is the first failure.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.min(30) as i32);
        let delay_ms = (self.base_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        let delay = Duration::from_millis(delay_ms as u64);

        if self.enable_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_percent <= 0.0 {
            return delay;
        }
        let mut rng = rand::thread_rng();
        let factor = 1.0 + rng.gen_range(-self.jitter_percent..=self.jitter_percent);
        Duration::from_millis((delay.as_millis() as f64 * factor).max(0.0) as u64)
    }
}
