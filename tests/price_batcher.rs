// tests/price_batcher.rs
mod common;

use chrono::Utc;
use common::{MockOracle, StalledOracle};
use futures::future::join_all;
use portfolio_valuation::api::BackoffStrategy;
use portfolio_valuation::cache::PriceCache;
use portfolio_valuation::error::ValuationError;
use portfolio_valuation::models::CanonicalTokenId;
use portfolio_valuation::pricing::{BatcherConfig, OracleError, PriceBatcher};
use portfolio_valuation::utils::ManualClock;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(300);

fn unavailable() -> OracleError {
    OracleError::HttpStatus {
        status: 503,
        endpoint: "mock".to_string(),
    }
}

fn manual_cache() -> (Arc<ManualClock>, Arc<PriceCache>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let cache = Arc::new(PriceCache::with_clock(TTL, clock.clone()));
    (clock, cache)
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_coalesce() {
    let oracle = MockOracle::with_prices(&[("ethereum", 3000.0)]);
    let batcher = PriceBatcher::new(Arc::new(PriceCache::new(TTL)), oracle.clone(), BatcherConfig::default());

    let id = CanonicalTokenId::new("ethereum");
    let results = join_all((0..10).map(|_| batcher.get_price(&id))).await;

    assert!(results.iter().all(|r| r.as_ref().map(|q| q.unit_price_usd) == Ok(3000.0)));
    assert_eq!(oracle.call_count(), 1);
    let stats = batcher.stats();
    assert_eq!(stats.tokens_requested, 1);
    assert_eq!(stats.coalesced_waiters, 9);
    assert_eq!(stats.pending, 0);
    println!("✅ 10 concurrent requests, 1 oracle call");
}

#[tokio::test(start_paused = true)]
async fn test_batches_are_split_and_paced() {
    let ids: Vec<CanonicalTokenId> = (0..120).map(|i| CanonicalTokenId::new(format!("token-{}", i))).collect();
    let pairs: Vec<(String, f64)> = ids.iter().map(|id| (id.to_string(), 1.0)).collect();
    let pair_refs: Vec<(&str, f64)> = pairs.iter().map(|(id, p)| (id.as_str(), *p)).collect();
    let oracle = MockOracle::with_prices(&pair_refs);
    let config = BatcherConfig::default();
    let rate_limit_delay = config.rate_limit_delay;
    let batcher = PriceBatcher::new(Arc::new(PriceCache::new(TTL)), oracle.clone(), config);

    let results = join_all(ids.iter().map(|id| batcher.get_price(id))).await;
    assert!(results.iter().all(|r| r.is_ok()));

    // ceil(120 / 50)
    assert_eq!(oracle.call_count(), 3);
    let sizes: Vec<usize> = oracle.batches().iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![50, 50, 20]);

    let times = oracle.call_times();
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= rate_limit_delay);
    }
    // the first call goes straight out, the other two wait at the gate
    assert_eq!(batcher.stats().paced_calls, 2);
    println!("✅ 120 tokens in 3 paced oracle calls");
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fall_back_to_stale_price() {
    let (clock, cache) = manual_cache();
    let id = CanonicalTokenId::new("solana");
    let fetched_at = cache.now();
    cache.put(id.clone(), 140.0, fetched_at);
    clock.advance(Duration::from_secs(600));

    let oracle = MockOracle::failing(u32::MAX, unavailable(), &[]);
    let batcher = PriceBatcher::new(cache.clone(), oracle.clone(), BatcherConfig::default());

    let quote = batcher.get_price(&id).await.unwrap();
    assert_eq!(quote.unit_price_usd, 140.0);
    assert!(quote.is_stale);
    assert_eq!(quote.fetched_at, fetched_at);
    assert_eq!(oracle.call_count(), 3);

    let stats = batcher.stats();
    assert_eq!(stats.failed_calls, 3);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.stale_fallbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_oracle_times_out_to_stale_price() {
    let (clock, cache) = manual_cache();
    let id = CanonicalTokenId::new("ethereum");
    let fetched_at = cache.now();
    cache.put(id.clone(), 3000.0, fetched_at);
    clock.advance(Duration::from_secs(600));

    let oracle = StalledOracle::new();
    let config = BatcherConfig {
        request_timeout: Duration::from_secs(5),
        ..BatcherConfig::default()
    };
    let batcher = PriceBatcher::new(cache, oracle.clone(), config);

    let started = tokio::time::Instant::now();
    let quote = batcher.get_price(&id).await.unwrap();
    assert_eq!(quote.unit_price_usd, 3000.0);
    assert!(quote.is_stale);
    assert_eq!(quote.fetched_at, fetched_at);
    assert!(started.elapsed() >= Duration::from_secs(15));

    assert_eq!(oracle.call_count(), 3);
    let stats = batcher.stats();
    assert_eq!(stats.failed_calls, 3);
    assert_eq!(stats.stale_fallbacks, 1);
    assert_eq!(stats.pending, 0);
    println!("✅ Stalled oracle calls expire and the stale price is served");
}

#[tokio::test(start_paused = true)]
async fn test_stalled_oracle_without_cache_is_unavailable() {
    let oracle = StalledOracle::new();
    let batcher = PriceBatcher::new(Arc::new(PriceCache::new(TTL)), oracle.clone(), BatcherConfig::default());

    let result = batcher.get_price(&CanonicalTokenId::new("bitcoin")).await;
    assert!(matches!(result, Err(ValuationError::OracleUnavailable(_))));
    assert_eq!(oracle.call_count(), 3);

    // the worker is free again for the next request
    let again = batcher.get_price(&CanonicalTokenId::new("solana")).await;
    assert!(again.is_err());
    assert_eq!(oracle.call_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_retry_delays_double() {
    let oracle = MockOracle::failing(2, unavailable(), &[("bitcoin", 60_000.0)]);
    let config = BatcherConfig {
        backoff: BackoffStrategy::exponential(Duration::from_secs(2)),
        ..BatcherConfig::default()
    };
    let batcher = PriceBatcher::new(Arc::new(PriceCache::new(TTL)), oracle.clone(), config);

    let quote = batcher.get_price(&CanonicalTokenId::new("bitcoin")).await.unwrap();
    assert_eq!(quote.unit_price_usd, 60_000.0);

    let times = oracle.call_times();
    assert_eq!(times.len(), 3);
    let first_gap = times[1] - times[0];
    let second_gap = times[2] - times[1];
    assert!(first_gap >= Duration::from_secs(2) && first_gap < Duration::from_millis(2500));
    assert!(second_gap >= Duration::from_secs(4) && second_gap < Duration::from_millis(4500));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_adds_cooldown() {
    let oracle = MockOracle::failing(
        1,
        OracleError::RateLimited("mock".to_string()),
        &[("sui", 1.2)],
    );
    let config = BatcherConfig {
        rate_limit_cooldown: Duration::from_secs(10),
        ..BatcherConfig::default()
    };
    let batcher = PriceBatcher::new(Arc::new(PriceCache::new(TTL)), oracle.clone(), config);

    batcher.get_price(&CanonicalTokenId::new("sui")).await.unwrap();

    let times = oracle.call_times();
    assert!(times[1] - times[0] >= Duration::from_secs(12));
    assert_eq!(batcher.stats().rate_limit_hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_price_anywhere_is_oracle_unavailable() {
    let oracle = MockOracle::failing(u32::MAX, unavailable(), &[]);
    let batcher = PriceBatcher::new(Arc::new(PriceCache::new(TTL)), oracle, BatcherConfig::default());

    let result = batcher.get_price(&CanonicalTokenId::new("ethereum")).await;
    assert!(matches!(result, Err(ValuationError::OracleUnavailable(_))));
}

#[tokio::test(start_paused = true)]
async fn test_degraded_mode_skips_oracle() {
    let (_clock, cache) = manual_cache();
    cache.put(CanonicalTokenId::new("binancecoin"), 600.0, cache.now());

    let oracle = MockOracle::failing(u32::MAX, unavailable(), &[]);
    let config = BatcherConfig {
        max_retries: 1,
        degraded_failure_threshold: 1,
        ..BatcherConfig::default()
    };
    let batcher = PriceBatcher::new(cache, oracle.clone(), config);

    let first = batcher.get_price(&CanonicalTokenId::new("ethereum")).await;
    assert!(matches!(first, Err(ValuationError::OracleUnavailable(_))));
    assert_eq!(oracle.call_count(), 1);
    assert!(batcher.stats().degraded);

    // fresh entries never reach the batch path
    let cached = batcher.get_price(&CanonicalTokenId::new("binancecoin")).await.unwrap();
    assert_eq!(cached.unit_price_usd, 600.0);

    let second = batcher.get_price(&CanonicalTokenId::new("solana")).await;
    assert!(matches!(second, Err(ValuationError::OracleUnavailable(_))));
    assert_eq!(oracle.call_count(), 1);
    assert_eq!(batcher.stats().degraded_batches, 1);
    println!("✅ Degraded batcher answered without the oracle");
}

#[tokio::test(start_paused = true)]
async fn test_stale_entry_triggers_refresh() {
    let (clock, cache) = manual_cache();
    let oracle = MockOracle::with_prices(&[("ethereum", 3000.0)]);
    let batcher = PriceBatcher::new(cache.clone(), oracle.clone(), BatcherConfig::default());
    let id = CanonicalTokenId::new("ethereum");

    batcher.get_price(&id).await.unwrap();
    batcher.get_price(&id).await.unwrap();
    assert_eq!(oracle.call_count(), 1);

    clock.advance(Duration::from_secs(301));
    assert!(cache.get_fresh(&id).is_none());
    assert!(cache.peek(&id).is_some());

    let refreshed = batcher.get_price(&id).await.unwrap();
    assert!(!refreshed.is_stale);
    assert_eq!(oracle.call_count(), 2);
}
