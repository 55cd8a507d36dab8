// src/valuation/mod.rs
//! Valuation passes: balances fanned out per chain, prices deduplicated per
//! pass and served through the shared batcher.

pub mod engine;
pub mod limiter;

pub use engine::ValuationEngine;
pub use limiter::{ChainLimiter, LimiterPermit};

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound for one balance lookup, endpoint failover included
    pub balance_timeout: Duration,
    pub max_concurrency: usize,
    pub per_chain_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            balance_timeout: Duration::from_secs(10),
            max_concurrency: 16,
            per_chain_concurrency: 4,
        }
    }
}
