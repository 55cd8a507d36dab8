// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use portfolio_valuation::blockchain::{evm, ChainBalanceClient, ChainClients};
use portfolio_valuation::error::ValuationError;
use portfolio_valuation::models::{BalanceResult, CanonicalTokenId, Chain, ChainFamily, TokenRef};
use portfolio_valuation::pricing::{OracleError, PriceOracle};
use portfolio_valuation::solana::parse_pubkey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const USDC_ETHEREUM: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
pub const WALLET_A: &str = "0x1111111111111111111111111111111111111111";
pub const WALLET_B: &str = "0x2222222222222222222222222222222222222222";
pub const SOL_WALLET: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

/// Balance client answering from a table after an optional delay.
pub struct MockChainClient {
    family: ChainFamily,
    balances: HashMap<(String, String), f64>,
    failing: HashMap<String, ValuationError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockChainClient {
    pub fn new(family: ChainFamily) -> Self {
        Self {
            family,
            balances: HashMap::new(),
            failing: HashMap::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn balance(mut self, address: &str, token_ref: impl Into<TokenRef>, quantity: f64) -> Self {
        self.balances
            .insert((address.to_string(), token_ref.into().to_string()), quantity);
        self
    }

    pub fn fail_for(mut self, address: &str, error: ValuationError) -> Self {
        self.failing.insert(address.to_string(), error);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainBalanceClient for MockChainClient {
    fn family(&self) -> ChainFamily {
        self.family
    }

    fn validate_address(&self, address: &str) -> Result<(), ValuationError> {
        match self.family {
            ChainFamily::Evm => evm::validate_evm_address(address),
            ChainFamily::Solana => parse_pubkey(address).map(|_| ()),
            _ => Ok(()),
        }
    }

    async fn query_balance(&self, address: &str, token_ref: &TokenRef) -> BalanceResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = self.failing.get(address) {
            return Err(error.clone());
        }
        Ok(self
            .balances
            .get(&(address.to_string(), token_ref.to_string()))
            .copied()
            .unwrap_or(0.0))
    }
}

/// Oracle with a fixed price table that can be told to fail its next calls.
pub struct MockOracle {
    prices: HashMap<CanonicalTokenId, f64>,
    fail_next: AtomicU32,
    failure: Mutex<OracleError>,
    calls: Mutex<Vec<(Instant, Vec<CanonicalTokenId>)>>,
}

impl MockOracle {
    pub fn with_prices(pairs: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self::table(pairs))
    }

    /// Fails the first `times` calls with `failure`, then serves `pairs`.
    pub fn failing(times: u32, failure: OracleError, pairs: &[(&str, f64)]) -> Arc<Self> {
        let oracle = Self::table(pairs);
        oracle.fail_next.store(times, Ordering::SeqCst);
        if let Ok(mut slot) = oracle.failure.lock() {
            *slot = failure;
        }
        Arc::new(oracle)
    }

    fn table(pairs: &[(&str, f64)]) -> Self {
        Self {
            prices: pairs
                .iter()
                .map(|(id, price)| (CanonicalTokenId::new(*id), *price))
                .collect(),
            fail_next: AtomicU32::new(0),
            failure: Mutex::new(OracleError::HttpStatus {
                status: 503,
                endpoint: "mock".to_string(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn batches(&self) -> Vec<Vec<CanonicalTokenId>> {
        self.calls.lock().unwrap().iter().map(|(_, ids)| ids.clone()).collect()
    }
}

#[async_trait]
impl PriceOracle for MockOracle {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_prices(
        &self,
        token_ids: &[CanonicalTokenId],
    ) -> Result<HashMap<CanonicalTokenId, f64>, OracleError> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), token_ids.to_vec()));

        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(self.failure.lock().unwrap().clone());
        }

        Ok(token_ids
            .iter()
            .filter_map(|id| self.prices.get(id).map(|price| (id.clone(), *price)))
            .collect())
    }
}

/// Oracle whose calls never complete.
#[derive(Default)]
pub struct StalledOracle {
    calls: AtomicUsize,
}

impl StalledOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceOracle for StalledOracle {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn fetch_prices(
        &self,
        _token_ids: &[CanonicalTokenId],
    ) -> Result<HashMap<CanonicalTokenId, f64>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        futures::future::pending().await
    }
}

pub fn clients(entries: Vec<(Chain, Arc<MockChainClient>)>) -> ChainClients {
    entries
        .into_iter()
        .fold(ChainClients::new(), |clients, (chain, client)| {
            clients.with_client(chain, client)
        })
}
