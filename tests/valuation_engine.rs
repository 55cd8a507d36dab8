// tests/valuation_engine.rs
mod common;

use assert_approx_eq::assert_approx_eq;
use common::*;
use portfolio_valuation::cache::PriceCache;
use portfolio_valuation::error::{ErrorCategory, ValuationError};
use portfolio_valuation::models::{
    Chain, ChainFamily, Holding, HoldingStatus, PortfolioSummary, TokenRef,
};
use portfolio_valuation::pricing::{BatcherConfig, PriceBatcher};
use portfolio_valuation::tokens::{TokenLibrary, TokenResolver};
use portfolio_valuation::valuation::{EngineConfig, ValuationEngine};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn engine(
    clients: portfolio_valuation::blockchain::ChainClients,
    oracle: Arc<MockOracle>,
) -> ValuationEngine {
    let cache = Arc::new(PriceCache::new(Duration::from_secs(300)));
    let batcher = Arc::new(PriceBatcher::new(cache, oracle, BatcherConfig::default()));
    let resolver = TokenResolver::new(Arc::new(TokenLibrary::predefined()), true);
    ValuationEngine::new(clients, resolver, batcher, EngineConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_two_usdc_holdings_share_one_oracle_call() {
    let eth = Arc::new(
        MockChainClient::new(ChainFamily::Evm)
            .balance(WALLET_A, USDC_ETHEREUM, 100.0)
            .balance(WALLET_B, USDC_ETHEREUM.to_lowercase(), 250.5),
    );
    let oracle = MockOracle::with_prices(&[("usd-coin", 1.00)]);
    let engine = engine(clients(vec![(Chain::Ethereum, eth.clone())]), oracle.clone());

    let results = engine
        .value(vec![
            Holding::new(Chain::Ethereum, WALLET_A, USDC_ETHEREUM, "USDC"),
            // lower-case spelling of the same contract
            Holding::new(Chain::Ethereum, WALLET_B, USDC_ETHEREUM.to_lowercase(), "USDC"),
        ])
        .await;

    assert_eq!(results.len(), 2);
    assert_approx_eq!(results[0].value_usd().unwrap(), 100.0);
    assert_approx_eq!(results[1].value_usd().unwrap(), 250.5);
    assert_eq!(results[0].token_id, results[1].token_id);
    assert_eq!(oracle.call_count(), 1);
    assert_eq!(oracle.batches()[0].len(), 1);
    assert_eq!(eth.calls(), 2);
    println!("✅ Two USDC holdings valued from a single oracle call");
}

#[tokio::test(start_paused = true)]
async fn test_canonical_id_shared_across_chains_is_requested_once() {
    let eth = Arc::new(MockChainClient::new(ChainFamily::Evm).balance(WALLET_A, TokenRef::Native, 1.5));
    let base = Arc::new(MockChainClient::new(ChainFamily::Evm).balance(WALLET_A, TokenRef::Native, 0.5));
    let arb = Arc::new(MockChainClient::new(ChainFamily::Evm).balance(WALLET_A, TokenRef::Native, 2.0));
    let oracle = MockOracle::with_prices(&[("ethereum", 3000.0)]);
    let engine = engine(
        clients(vec![
            (Chain::Ethereum, eth),
            (Chain::Base, base),
            (Chain::Arbitrum, arb),
        ]),
        oracle.clone(),
    );

    let results = engine
        .value(vec![
            Holding::native(Chain::Ethereum, WALLET_A),
            Holding::native(Chain::Base, WALLET_A),
            Holding::native(Chain::Arbitrum, WALLET_A),
        ])
        .await;

    let total: f64 = results.iter().filter_map(|r| r.value_usd()).sum();
    assert_approx_eq!(total, 12_000.0);
    assert_eq!(oracle.call_count(), 1);
    assert_eq!(engine.batcher_stats().tokens_requested, 1);
}

#[tokio::test(start_paused = true)]
async fn test_warm_cache_second_pass_is_identical_and_offline() {
    let eth = Arc::new(
        MockChainClient::new(ChainFamily::Evm)
            .balance(WALLET_A, TokenRef::Native, 2.0)
            .balance(WALLET_A, USDC_ETHEREUM, 10.0),
    );
    let oracle = MockOracle::with_prices(&[("ethereum", 2500.0), ("usd-coin", 1.0)]);
    let engine = engine(clients(vec![(Chain::Ethereum, eth)]), oracle.clone());
    let holdings = vec![
        Holding::native(Chain::Ethereum, WALLET_A),
        Holding::new(Chain::Ethereum, WALLET_A, USDC_ETHEREUM, "USDC"),
    ];

    let first = engine.value(holdings.clone()).await;
    let calls_after_first = oracle.call_count();
    let second = engine.value(holdings).await;

    assert_eq!(first, second);
    assert_eq!(oracle.call_count(), calls_after_first);
    assert!(engine.cache_stats().hit_count >= 2);
    println!("✅ Warm cache served the second pass");
}

#[tokio::test(start_paused = true)]
async fn test_slow_chain_times_out_without_affecting_others() {
    let eth = Arc::new(MockChainClient::new(ChainFamily::Evm).balance(WALLET_A, TokenRef::Native, 1.0));
    let sol = Arc::new(MockChainClient::new(ChainFamily::Solana).delay(Duration::from_secs(3600)));
    let oracle = MockOracle::with_prices(&[("ethereum", 3000.0), ("solana", 150.0)]);
    let engine = engine(
        clients(vec![(Chain::Ethereum, eth), (Chain::Solana, sol.clone())]),
        oracle.clone(),
    );

    let results = engine
        .value(vec![
            Holding::native(Chain::Solana, SOL_WALLET),
            Holding::native(Chain::Ethereum, WALLET_A),
        ])
        .await;

    assert!(matches!(results[0].error(), Some(ValuationError::Timeout(_))));
    assert_eq!(results[0].status(), HoldingStatus::Failed);
    assert_approx_eq!(results[1].value_usd().unwrap(), 3000.0);
    assert_eq!(sol.calls(), 1);
    // the failed balance never asked for a price
    assert!(oracle.batches().iter().flatten().all(|id| id.as_str() != "solana"));
}

#[tokio::test(start_paused = true)]
async fn test_offline_failures_skip_the_network() {
    let eth = Arc::new(MockChainClient::new(ChainFamily::Evm));
    let oracle = MockOracle::with_prices(&[]);
    let engine = engine(clients(vec![(Chain::Ethereum, eth.clone())]), oracle.clone());

    let results = engine
        .value(vec![
            Holding::new(Chain::Ethereum, WALLET_A, "0x3333333333333333333333333333333333333333", "NOPE"),
            Holding::native(Chain::Ethereum, "0x1234"),
            Holding::native(Chain::Ethereum, "vitalik.eth"),
            Holding::native(Chain::Polygon, WALLET_A),
        ])
        .await;

    assert!(matches!(results[0].error(), Some(ValuationError::UnknownToken(_))));
    assert!(matches!(results[1].error(), Some(ValuationError::InvalidAddress(_))));
    assert!(matches!(
        results[2].error(),
        Some(ValuationError::UnsupportedAddressFormat(_))
    ));
    // no client registered for polygon
    assert!(matches!(results[3].error(), Some(ValuationError::RpcError(_))));
    assert!(results.iter().all(|r| r.token_id.is_none()));
    assert_eq!(eth.calls(), 0);
    assert_eq!(oracle.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_price_keeps_quantity() {
    let link_like = "0x4444444444444444444444444444444444444444";
    let eth = Arc::new(MockChainClient::new(ChainFamily::Evm).balance(WALLET_A, link_like, 42.0));
    let oracle = MockOracle::with_prices(&[("ethereum", 3000.0)]);
    let engine = engine(clients(vec![(Chain::Ethereum, eth)]), oracle.clone());

    let results = engine
        .value(vec![Holding::new(Chain::Ethereum, WALLET_A, link_like, "LINK")])
        .await;

    let result = &results[0];
    assert_eq!(result.token_id.as_ref().map(|id| id.as_str()), Some("chainlink"));
    assert_eq!(result.status(), HoldingStatus::QuantityOnly);
    assert_eq!(result.quantity(), Some(42.0));
    assert_eq!(result.value_usd(), None);
    assert!(matches!(result.error(), Some(ValuationError::PriceUnavailable(_))));
    assert_eq!(engine.cache_stats().entry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_balance_error_is_kept_and_results_follow_input_order() {
    let eth = Arc::new(
        MockChainClient::new(ChainFamily::Evm)
            .balance(WALLET_A, TokenRef::Native, 1.0)
            .fail_for(WALLET_B, ValuationError::RpcError("node down".to_string()))
            .delay(Duration::from_millis(5)),
    );
    let oracle = MockOracle::with_prices(&[("ethereum", 2000.0)]);
    let engine = engine(clients(vec![(Chain::Ethereum, eth)]), oracle);

    let holdings = vec![
        Holding::native(Chain::Ethereum, WALLET_B),
        Holding::native(Chain::Ethereum, WALLET_A),
        Holding::new(Chain::Ethereum, WALLET_A, "0x5555555555555555555555555555555555555555", ""),
    ];
    let results = engine.value(holdings.clone()).await;

    let returned: Vec<&Holding> = results.iter().map(|r| &r.holding).collect();
    assert_eq!(returned, holdings.iter().collect::<Vec<_>>());
    assert_eq!(
        results[0].error(),
        Some(&ValuationError::RpcError("node down".to_string()))
    );

    let summary = PortfolioSummary::from_results(&results);
    assert_eq!(summary.holdings, 3);
    assert_eq!(summary.valued, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.failures_by_category.get(&ErrorCategory::Network), Some(&1));
    assert_eq!(summary.failures_by_category.get(&ErrorCategory::TokenData), Some(&1));
    // the node outage may clear up, the unknown token will not
    assert_eq!(summary.recoverable, 1);
    assert_approx_eq!(summary.total_value_usd, 2000.0);
}

#[tokio::test(start_paused = true)]
async fn test_clear_cache_forces_refetch() {
    let eth = Arc::new(MockChainClient::new(ChainFamily::Evm).balance(WALLET_A, TokenRef::Native, 1.0));
    let oracle = MockOracle::with_prices(&[("ethereum", 3000.0)]);
    let engine = engine(clients(vec![(Chain::Ethereum, eth)]), oracle.clone());
    let holdings = vec![Holding::native(Chain::Ethereum, WALLET_A)];

    engine.value(holdings.clone()).await;
    assert_eq!(engine.clear_expired(), 0);
    engine.clear_cache();
    assert_eq!(engine.cache_stats().entry_count, 0);

    engine.value(holdings).await;
    assert_eq!(oracle.call_count(), 2);
}
