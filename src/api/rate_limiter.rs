// src/api/rate_limiter.rs
//! Process-wide pacing for the price oracle.
//!
//! The gate remembers when the last call was let through and makes the next
//! caller sleep until `min_delay` has passed. Callers are served in lock order,
//! so successive calls (retries included) are always spaced by `min_delay`.

use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
pub struct PacingGate {
    min_delay: Duration,
    last_request: Mutex<Option<Instant>>,
    throttled: AtomicU64,
}

impl PacingGate {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: Mutex::new(None),
            throttled: AtomicU64::new(0),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Waits until a call may go out and stamps it as the latest one.
    pub async fn wait_turn(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_delay;
            if ready_at > Instant::now() {
                self.throttled.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "⏳ Pacing oracle call for {}ms",
                    (ready_at - Instant::now()).as_millis()
                );
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Calls that had to sleep before going out.
    pub fn throttled(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }
}
