// src/cache.rs
//! In-process price cache keyed by canonical token id.
//!
//! - Entries carry their own TTL; freshness is judged against an injected clock
//! - Stale entries stay until `clear_all` / `clear_expired`, so the batcher can
//!   fall back to the last known price when the oracle is down
//! - `get` counts hits (fresh) and misses (stale or absent); `peek` does not

use crate::models::CanonicalTokenId;
use crate::utils::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PRICE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCacheEntry {
    pub token_id: CanonicalTokenId,
    pub unit_price_usd: f64,
    pub fetched_at: DateTime<Utc>,
    pub ttl_millis: u64,
}

impl PriceCacheEntry {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        let age_ms = (now - self.fetched_at).num_milliseconds();
        // a timestamp from the future (clock skew) still counts as fresh
        age_ms < i64::try_from(self.ttl_millis).unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub entry_count: usize,
    pub fresh_count: usize,
    pub stale_count: usize,
}

impl CacheStats {
    /// Fraction of lookups served fresh, in `[0, 1]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }

    pub fn hit_rate_percent(&self) -> f64 {
        self.hit_rate() * 100.0
    }
}

#[derive(Debug)]
pub struct PriceCache {
    entries: DashMap<CanonicalTokenId, PriceCacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        info!("🗄️  Initializing price cache (TTL: {}s)", ttl.as_secs());
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns the entry whether fresh or stale; only a fresh entry is a hit.
    pub fn get(&self, token_id: &CanonicalTokenId) -> Option<PriceCacheEntry> {
        let entry = self.entries.get(token_id).map(|e| e.value().clone());
        match &entry {
            Some(e) if e.is_fresh_at(self.clock.now()) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("🎯 Cache HIT for {}", token_id);
            }
            Some(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("⌛ Cache STALE for {}", token_id);
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📡 Cache MISS for {}", token_id);
            }
        }
        entry
    }

    /// Fresh entry only, counted like `get`.
    pub fn get_fresh(&self, token_id: &CanonicalTokenId) -> Option<PriceCacheEntry> {
        let now = self.clock.now();
        self.get(token_id).filter(|e| e.is_fresh_at(now))
    }

    pub fn peek(&self, token_id: &CanonicalTokenId) -> Option<PriceCacheEntry> {
        self.entries.get(token_id).map(|e| e.value().clone())
    }

    pub fn peek_fresh(&self, token_id: &CanonicalTokenId) -> Option<PriceCacheEntry> {
        let now = self.clock.now();
        self.peek(token_id).filter(|e| e.is_fresh_at(now))
    }

    pub fn put(&self, token_id: CanonicalTokenId, price: f64, fetched_at: DateTime<Utc>) {
        self.put_with_ttl(token_id, price, fetched_at, self.ttl);
    }

    pub fn put_with_ttl(
        &self,
        token_id: CanonicalTokenId,
        price: f64,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) {
        let entry = PriceCacheEntry {
            token_id: token_id.clone(),
            unit_price_usd: price,
            fetched_at,
            ttl_millis: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        };
        self.entries.insert(token_id, entry);
    }

    pub fn clear_all(&self) {
        let count = self.entries.len();
        self.entries.clear();
        info!("🧹 Price cache cleared ({} entries)", count);
    }

    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh_at(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("🧹 Evicted {} expired price entries", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let fresh_count = self
            .entries
            .iter()
            .filter(|e| e.value().is_fresh_at(now))
            .count();
        let entry_count = self.entries.len();
        CacheStats {
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            entry_count,
            fresh_count,
            stale_count: entry_count.saturating_sub(fresh_count),
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_TTL)
    }
}
