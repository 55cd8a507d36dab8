//! Timing helpers for valuation passes
//!
//! Measures a pass and its phases (resolution, balance fan-out, pricing) and
//! logs them at the end.

use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// A timer for measuring one operation with optional checkpoints
#[derive(Debug)]
pub struct Timer {
    start_time: Instant,
    operation_name: String,
    checkpoints: Vec<(String, Instant)>,
}

impl Timer {
    pub fn start(operation_name: &str) -> Self {
        debug!("⏱️ Starting timer for: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name: operation_name.to_string(),
            checkpoints: Vec::new(),
        }
    }

    pub fn checkpoint(&mut self, checkpoint_name: &str) {
        let now = Instant::now();
        debug!(
            "📍 {} - {}: {}ms",
            self.operation_name,
            checkpoint_name,
            now.duration_since(self.start_time).as_millis()
        );
        self.checkpoints.push((checkpoint_name.to_string(), now));
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Logs the total and each checkpoint segment; warns past `threshold`.
    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let total = self.start_time.elapsed();
        if total > threshold {
            warn!(
                "🐌 {} took {}ms (threshold {}ms)",
                self.operation_name,
                total.as_millis(),
                threshold.as_millis()
            );
        } else {
            info!("🕐 {} completed in {}ms", self.operation_name, total.as_millis());
        }

        let mut last = self.start_time;
        for (name, at) in &self.checkpoints {
            debug!("   └─ {}: {}ms", name, at.duration_since(last).as_millis());
            last = *at;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_records_checkpoints() {
        let mut timer = Timer::start("pass");
        timer.checkpoint("resolve");
        timer.checkpoint("balances");
        assert_eq!(timer.checkpoints.len(), 2);
        let total = timer.finish_with_threshold(Duration::from_secs(60));
        assert!(total < Duration::from_secs(60));
    }
}
