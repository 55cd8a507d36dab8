// src/api/mod.rs
//! Upstream API plumbing
//!
//! - Pacing gate enforcing a minimum delay between oracle calls
//! - Backoff strategy and HTTP error classification for retries and failover

pub mod backoff;
pub mod rate_limiter;

pub use backoff::{ApiErrorType, BackoffStrategy};
pub use rate_limiter::PacingGate;
