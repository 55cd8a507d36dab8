// src/valuation/limiter.rs
use crate::config::settings::MAX_CONCURRENCY_CAP;
use crate::error::ValuationError;
use crate::models::Chain;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Global plus per-chain bound on in-flight balance lookups.
///
/// The chain permit is taken first, so a backlog on one slow chain queues on
/// its own semaphore without holding global slots.
#[derive(Debug)]
pub struct ChainLimiter {
    global: Arc<Semaphore>,
    per_chain: HashMap<Chain, Arc<Semaphore>>,
    per_chain_limit: usize,
}

/// Both permits; dropping it frees the slots.
#[derive(Debug)]
pub struct LimiterPermit {
    _chain: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

impl ChainLimiter {
    pub fn new(max_concurrency: usize, per_chain_concurrency: usize) -> Self {
        let global = max_concurrency.clamp(1, MAX_CONCURRENCY_CAP);
        let per_chain_limit = per_chain_concurrency.clamp(1, global);
        let per_chain = Chain::ALL
            .iter()
            .map(|chain| (*chain, Arc::new(Semaphore::new(per_chain_limit))))
            .collect();

        Self {
            global: Arc::new(Semaphore::new(global)),
            per_chain,
            per_chain_limit,
        }
    }

    pub fn per_chain_limit(&self) -> usize {
        self.per_chain_limit
    }

    pub fn available_global(&self) -> usize {
        self.global.available_permits()
    }

    pub async fn acquire(&self, chain: Chain) -> Result<LimiterPermit, ValuationError> {
        let chain_semaphore = self
            .per_chain
            .get(&chain)
            .cloned()
            .ok_or_else(|| ValuationError::RpcError(format!("no concurrency slot for {}", chain)))?;

        let chain_permit = chain_semaphore
            .acquire_owned()
            .await
            .map_err(|e| ValuationError::RpcError(format!("{} limiter closed: {}", chain, e)))?;
        let global_permit = self
            .global
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ValuationError::RpcError(format!("global limiter closed: {}", e)))?;

        Ok(LimiterPermit {
            _chain: chain_permit,
            _global: global_permit,
        })
    }
}
