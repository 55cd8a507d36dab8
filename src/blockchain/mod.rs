// src/blockchain/mod.rs
//! Per-family balance clients and the registry that maps chains to them.
//!
//! - `evm`: raw JSON-RPC (`eth_getBalance`, ERC-20 `balanceOf`)
//! - `sui`: `suix_getBalance` with coin metadata decimals
//! - `bitcoin`: Esplora confirmed UTXO sum
//! - Solana lives in `crate::solana` on top of `solana-client`

pub mod bitcoin;
pub mod evm;
pub mod json_rpc;
pub mod sui;

pub use bitcoin::BitcoinBalanceClient;
pub use evm::EvmBalanceClient;
pub use sui::SuiBalanceClient;

use crate::config::Config;
use crate::error::{Result, ValuationError};
use crate::models::{BalanceResult, Chain, ChainFamily, TokenRef};
use crate::solana::SolanaBalanceClient;
use async_trait::async_trait;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait ChainBalanceClient: Send + Sync {
    fn family(&self) -> ChainFamily;

    /// Syntactic check only; must not touch the network.
    fn validate_address(&self, address: &str) -> std::result::Result<(), ValuationError>;

    fn validate_token_ref(&self, _token_ref: &TokenRef) -> std::result::Result<(), ValuationError> {
        Ok(())
    }

    /// Quantity in display units for an already validated pair.
    async fn query_balance(&self, address: &str, token_ref: &TokenRef) -> BalanceResult;

    async fn fetch_balance(
        &self,
        address: &str,
        token_ref: &TokenRef,
        timeout: Duration,
    ) -> BalanceResult {
        self.validate_address(address)?;
        self.validate_token_ref(token_ref)?;

        match tokio::time::timeout(timeout, self.query_balance(address, token_ref)).await {
            Ok(result) => result,
            Err(_) => Err(ValuationError::Timeout(format!(
                "{} balance lookup for {} exceeded {:?}",
                self.family(),
                address,
                timeout
            ))),
        }
    }
}

/// Chain → client registry.
#[derive(Clone, Default)]
pub struct ChainClients {
    clients: HashMap<Chain, Arc<dyn ChainBalanceClient>>,
}

impl ChainClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, chain: Chain, client: Arc<dyn ChainBalanceClient>) -> Self {
        self.register(chain, client);
        self
    }

    pub fn register(&mut self, chain: Chain, client: Arc<dyn ChainBalanceClient>) {
        self.clients.insert(chain, client);
    }

    pub fn get(&self, chain: Chain) -> Option<Arc<dyn ChainBalanceClient>> {
        self.clients.get(&chain).cloned()
    }

    pub fn chains(&self) -> Vec<Chain> {
        let mut chains: Vec<Chain> = self.clients.keys().copied().collect();
        chains.sort();
        chains
    }

    /// One client per supported chain, chosen by `Chain::family()`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.balance_timeout_secs))
            .user_agent(concat!("portfolio-valuation/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut clients = ChainClients::new();
        for chain in Chain::ALL {
            let endpoints = config.endpoints(chain);
            let client: Arc<dyn ChainBalanceClient> = match chain.family() {
                ChainFamily::Evm => Arc::new(EvmBalanceClient::new(chain, http.clone(), endpoints.all())),
                ChainFamily::Solana => Arc::new(SolanaBalanceClient::new(
                    &endpoints.primary,
                    endpoints.backups.clone(),
                )),
                ChainFamily::Sui => Arc::new(SuiBalanceClient::new(http.clone(), endpoints.all())),
                ChainFamily::Bitcoin => {
                    Arc::new(BitcoinBalanceClient::new(http.clone(), endpoints.all()))
                }
            };
            clients.register(chain, client);
        }
        info!("🔗 Balance clients ready for {} chains", clients.clients.len());
        Ok(clients)
    }
}

impl std::fmt::Debug for ChainClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClients")
            .field("chains", &self.chains())
            .finish()
    }
}
