// src/pricing/batcher.rs
//! Coalescing, batching price fetcher.
//!
//! - A fresh cache entry answers immediately
//! - Concurrent requests for the same token share one pending record and one
//!   oracle lookup
//! - A single worker drains the queue into batches of up to `batch_size` ids,
//!   passes each call through the pacing gate and retries the whole batch with
//!   exponential backoff
//! - After repeated exhausted batches the circuit breaker opens and batches are
//!   answered from stale cache entries without touching the oracle

use super::oracle::{OracleError, PriceOracle};
use crate::api::backoff::BackoffStrategy;
use crate::api::rate_limiter::PacingGate;
use crate::cache::{PriceCache, PriceCacheEntry};
use crate::error::{CircuitBreaker, CircuitBreakerState, ValuationError};
use crate::models::{CanonicalTokenId, PriceQuote, PriceResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, timeout_at, Instant};

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub batch_size: usize,
    pub collection_delay: Duration,
    pub rate_limit_delay: Duration,
    /// Upper bound for one oracle call; expiry counts as a failed attempt
    pub request_timeout: Duration,
    /// Total oracle attempts per batch, the first one included
    pub max_retries: u32,
    pub backoff: BackoffStrategy,
    pub rate_limit_cooldown: Duration,
    pub degraded_failure_threshold: u32,
    pub degraded_cooldown: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            collection_delay: Duration::from_millis(50),
            rate_limit_delay: Duration::from_millis(1200),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff: BackoffStrategy::exponential(Duration::from_secs(2)),
            rate_limit_cooldown: Duration::from_secs(60),
            degraded_failure_threshold: 3,
            degraded_cooldown: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatcherStats {
    pub tokens_requested: u64,
    pub coalesced_waiters: u64,
    pub batches_dispatched: u64,
    pub oracle_calls: u64,
    pub failed_calls: u64,
    pub retries: u64,
    pub rate_limit_hits: u64,
    pub stale_fallbacks: u64,
    pub degraded_batches: u64,
    /// Oracle calls that had to wait at the pacing gate
    pub paced_calls: u64,
    pub pending: usize,
    pub degraded: bool,
}

#[derive(Debug, Default)]
struct BatcherCounters {
    tokens_requested: AtomicU64,
    coalesced_waiters: AtomicU64,
    batches_dispatched: AtomicU64,
    oracle_calls: AtomicU64,
    failed_calls: AtomicU64,
    retries: AtomicU64,
    rate_limit_hits: AtomicU64,
    stale_fallbacks: AtomicU64,
    degraded_batches: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Waiters for one token between "not cached" and "batch call completed".
#[derive(Debug)]
struct PendingPriceRequest {
    waiters: Vec<oneshot::Sender<PriceResult>>,
}

struct BatcherShared {
    cache: Arc<PriceCache>,
    oracle: Arc<dyn PriceOracle>,
    pending: DashMap<CanonicalTokenId, PendingPriceRequest>,
    gate: Arc<PacingGate>,
    config: BatcherConfig,
    counters: BatcherCounters,
    breaker: Mutex<CircuitBreaker>,
}

pub struct PriceBatcher {
    shared: Arc<BatcherShared>,
    queue: mpsc::UnboundedSender<CanonicalTokenId>,
    worker: JoinHandle<()>,
}

impl PriceBatcher {
    /// Spawns the aggregation worker; must be called inside a tokio runtime.
    pub fn new(cache: Arc<PriceCache>, oracle: Arc<dyn PriceOracle>, config: BatcherConfig) -> Self {
        let gate = Arc::new(PacingGate::new(config.rate_limit_delay));
        Self::with_gate(cache, oracle, gate, config)
    }

    /// Same as `new` but paced by an existing gate, so several batchers can
    /// share one oracle budget.
    pub fn with_gate(
        cache: Arc<PriceCache>,
        oracle: Arc<dyn PriceOracle>,
        gate: Arc<PacingGate>,
        config: BatcherConfig,
    ) -> Self {
        info!(
            "🚀 Price batcher started (oracle: {}, batch: {}, pacing: {}ms, attempts: {})",
            oracle.name(),
            config.batch_size,
            gate.min_delay().as_millis(),
            config.max_retries
        );
        let breaker = CircuitBreaker::new(config.degraded_failure_threshold, config.degraded_cooldown);
        let shared = Arc::new(BatcherShared {
            cache,
            oracle,
            pending: DashMap::new(),
            gate,
            config,
            counters: BatcherCounters::default(),
            breaker: Mutex::new(breaker),
        });

        let (queue, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(shared.clone(), receiver));

        Self {
            shared,
            queue,
            worker,
        }
    }

    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.shared.cache
    }

    pub async fn get_price(&self, token_id: &CanonicalTokenId) -> PriceResult {
        if let Some(entry) = self.shared.cache.get_fresh(token_id) {
            return Ok(quote_from(&entry, false));
        }

        let (tx, rx) = oneshot::channel();
        let enqueue = match self.shared.pending.entry(token_id.clone()) {
            Entry::Occupied(mut pending) => {
                pending.get_mut().waiters.push(tx);
                bump(&self.shared.counters.coalesced_waiters);
                debug!("🔗 Joined pending price request for {}", token_id);
                false
            }
            Entry::Vacant(slot) => {
                // a batch may have landed between the cache read and taking the slot
                if let Some(entry) = self.shared.cache.peek_fresh(token_id) {
                    return Ok(quote_from(&entry, false));
                }
                slot.insert(PendingPriceRequest { waiters: vec![tx] });
                bump(&self.shared.counters.tokens_requested);
                true
            }
        };

        if enqueue && self.queue.send(token_id.clone()).is_err() {
            self.shared.resolve(
                token_id,
                Err(ValuationError::OracleUnavailable(
                    "price batcher worker stopped".to_string(),
                )),
            );
        }

        rx.await.unwrap_or_else(|_| {
            Err(ValuationError::OracleUnavailable(format!(
                "price request for {} was dropped",
                token_id
            )))
        })
    }

    pub fn stats(&self) -> BatcherStats {
        let c = &self.shared.counters;
        BatcherStats {
            tokens_requested: c.tokens_requested.load(Ordering::Relaxed),
            coalesced_waiters: c.coalesced_waiters.load(Ordering::Relaxed),
            batches_dispatched: c.batches_dispatched.load(Ordering::Relaxed),
            oracle_calls: c.oracle_calls.load(Ordering::Relaxed),
            failed_calls: c.failed_calls.load(Ordering::Relaxed),
            retries: c.retries.load(Ordering::Relaxed),
            rate_limit_hits: c.rate_limit_hits.load(Ordering::Relaxed),
            stale_fallbacks: c.stale_fallbacks.load(Ordering::Relaxed),
            degraded_batches: c.degraded_batches.load(Ordering::Relaxed),
            paced_calls: self.shared.gate.throttled(),
            pending: self.shared.pending.len(),
            degraded: self.shared.breaker().state() == CircuitBreakerState::Open,
        }
    }
}

impl Drop for PriceBatcher {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

fn quote_from(entry: &PriceCacheEntry, is_stale: bool) -> PriceQuote {
    PriceQuote {
        token_id: entry.token_id.clone(),
        unit_price_usd: entry.unit_price_usd,
        fetched_at: entry.fetched_at,
        is_stale,
    }
}

async fn run_worker(shared: Arc<BatcherShared>, mut receiver: mpsc::UnboundedReceiver<CanonicalTokenId>) {
    while let Some(first) = receiver.recv().await {
        let mut seen = HashSet::new();
        let mut batch = Vec::with_capacity(shared.config.batch_size);
        seen.insert(first.clone());
        batch.push(first);

        let deadline = Instant::now() + shared.config.collection_delay;
        while batch.len() < shared.config.batch_size {
            match timeout_at(deadline, receiver.recv()).await {
                Ok(Some(token_id)) => {
                    if seen.insert(token_id.clone()) {
                        batch.push(token_id);
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }

        shared.dispatch(batch).await;
    }
    debug!("Price batcher worker exiting");
}

impl BatcherShared {
    fn breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        match self.breaker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn resolve(&self, token_id: &CanonicalTokenId, result: PriceResult) {
        if let Some((_, pending)) = self.pending.remove(token_id) {
            for waiter in pending.waiters {
                // the caller may have gone away
                let _ = waiter.send(result.clone());
            }
        }
    }

    /// Last known price, marked stale unless it happens to still be fresh.
    fn fallback(&self, token_id: &CanonicalTokenId, reason: &str) -> PriceResult {
        match self.cache.peek(token_id) {
            Some(entry) => {
                bump(&self.counters.stale_fallbacks);
                let is_stale = !entry.is_fresh_at(self.cache.now());
                Ok(quote_from(&entry, is_stale))
            }
            None => Err(ValuationError::OracleUnavailable(format!(
                "{}: {}",
                token_id, reason
            ))),
        }
    }

    async fn dispatch(&self, batch: Vec<CanonicalTokenId>) {
        bump(&self.counters.batches_dispatched);

        if !self.breaker().allow_request() {
            bump(&self.counters.degraded_batches);
            warn!(
                "🛑 Oracle in degraded mode, answering {} token(s) from cache",
                batch.len()
            );
            for token_id in &batch {
                let result = self.fallback(token_id, "oracle in degraded mode");
                self.resolve(token_id, result);
            }
            return;
        }

        let mut attempt: u32 = 0;
        loop {
            self.gate.wait_turn().await;
            bump(&self.counters.oracle_calls);
            debug!(
                "📡 Oracle call for {} token(s) (attempt {}/{})",
                batch.len(),
                attempt + 1,
                self.config.max_retries
            );

            let call = self.oracle.fetch_prices(&batch);
            let response = match timeout(self.config.request_timeout, call).await {
                Ok(response) => response,
                Err(_) => Err(OracleError::Timeout(format!(
                    "{} after {:?}",
                    self.oracle.name(),
                    self.config.request_timeout
                ))),
            };

            match response {
                Ok(prices) => {
                    self.breaker().record_success();
                    let now = self.cache.now();
                    let mut results = Vec::with_capacity(batch.len());

                    // every cache write lands before any waiter is released
                    for token_id in &batch {
                        let result = match prices.get(token_id) {
                            Some(price) if price.is_finite() && *price >= 0.0 => {
                                self.cache.put(token_id.clone(), *price, now);
                                Ok(PriceQuote {
                                    token_id: token_id.clone(),
                                    unit_price_usd: *price,
                                    fetched_at: now,
                                    is_stale: false,
                                })
                            }
                            Some(price) => Err(ValuationError::PriceUnavailable(format!(
                                "oracle returned invalid price {} for {}",
                                price, token_id
                            ))),
                            None => Err(ValuationError::PriceUnavailable(format!(
                                "{} not listed by {}",
                                token_id,
                                self.oracle.name()
                            ))),
                        };
                        results.push((token_id, result));
                    }

                    let missing = results.iter().filter(|(_, r)| r.is_err()).count();
                    if missing > 0 {
                        warn!("⚠️ Oracle had no usable price for {}/{} token(s)", missing, batch.len());
                    }
                    for (token_id, result) in results {
                        self.resolve(token_id, result);
                    }
                    return;
                }
                Err(error) => {
                    bump(&self.counters.failed_calls);
                    attempt += 1;
                    let rate_limited = error.is_rate_limit();
                    if rate_limited {
                        bump(&self.counters.rate_limit_hits);
                    }

                    if attempt >= self.config.max_retries {
                        self.exhausted(&batch, &error);
                        return;
                    }

                    let mut delay = self.config.backoff.delay_for_attempt(attempt - 1);
                    if rate_limited {
                        delay += self.config.rate_limit_cooldown;
                    }
                    bump(&self.counters.retries);
                    warn!(
                        "🔄 Oracle call failed ({}), retrying in {:?} (attempt {}/{})",
                        error,
                        delay,
                        attempt + 1,
                        self.config.max_retries
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    fn exhausted(&self, batch: &[CanonicalTokenId], error: &OracleError) {
        warn!(
            "❌ Oracle gave up after {} attempt(s): {}",
            self.config.max_retries, error
        );
        self.breaker().record_failure();

        let reason = error.to_string();
        for token_id in batch {
            let result = self.fallback(token_id, &reason);
            self.resolve(token_id, result);
        }
    }
}
