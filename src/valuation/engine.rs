// src/valuation/engine.rs
//! One `value()` call is a pass:
//!
//! 1. resolve a client and a canonical token id per holding (no network)
//! 2. fan out balance lookups under the global and per-chain limits
//! 3. as each balance lands, ask for its price through a per-pass memo so each
//!    canonical id is requested once, however many holdings share it
//! 4. combine, and return one result per holding once every task has settled

use super::{ChainLimiter, EngineConfig};
use crate::blockchain::{ChainBalanceClient, ChainClients};
use crate::cache::{CacheStats, PriceCache};
use crate::config::Config;
use crate::error::{Result, ValuationError};
use crate::models::{
    CanonicalTokenId, Holding, PortfolioSummary, PriceResult, Valuation, ValuationResult,
};
use crate::pricing::{BatcherStats, CoinGeckoOracle, PriceBatcher, PriceOracle};
use crate::tokens::{TokenLibrary, TokenResolver};
use crate::utils::Timer;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{FuturesUnordered, StreamExt};
use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const SLOW_PASS_THRESHOLD: Duration = Duration::from_secs(30);

type SharedPrice = Shared<BoxFuture<'static, PriceResult>>;

/// Canonical id → the single in-flight price lookup of this pass.
#[derive(Default)]
struct PriceMemo {
    prices: Mutex<HashMap<CanonicalTokenId, SharedPrice>>,
}

impl PriceMemo {
    fn get_or_start(&self, token_id: &CanonicalTokenId, batcher: &Arc<PriceBatcher>) -> SharedPrice {
        let mut prices = match self.prices.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        prices
            .entry(token_id.clone())
            .or_insert_with(|| {
                let batcher = batcher.clone();
                let token_id = token_id.clone();
                async move { batcher.get_price(&token_id).await }.boxed().shared()
            })
            .clone()
    }

    fn len(&self) -> usize {
        match self.prices.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Work that survived the offline checks.
struct Prepared {
    index: usize,
    holding: Holding,
    client: Arc<dyn ChainBalanceClient>,
    token_id: CanonicalTokenId,
}

pub struct ValuationEngine {
    clients: ChainClients,
    resolver: TokenResolver,
    batcher: Arc<PriceBatcher>,
    limiter: ChainLimiter,
    config: EngineConfig,
}

impl ValuationEngine {
    pub fn new(
        clients: ChainClients,
        resolver: TokenResolver,
        batcher: Arc<PriceBatcher>,
        config: EngineConfig,
    ) -> Self {
        let limiter = ChainLimiter::new(config.max_concurrency, config.per_chain_concurrency);
        info!(
            "💼 Valuation engine ready: {} chain client(s), concurrency {} global / {} per chain, balance timeout {:?}",
            clients.chains().len(),
            limiter.available_global(),
            limiter.per_chain_limit(),
            config.balance_timeout
        );
        Self {
            clients,
            resolver,
            batcher,
            limiter,
            config,
        }
    }

    /// Production wiring: CoinGecko oracle, TTL cache, token library with the
    /// optional custom file, one balance client per chain. Needs a running
    /// tokio runtime for the batcher worker.
    pub fn from_config(config: &Config) -> Result<Self> {
        let library = TokenLibrary::load(config.custom_tokens_path.as_deref())?;
        let resolver = TokenResolver::new(Arc::new(library), config.token_symbol_fallback);

        let oracle: Arc<dyn PriceOracle> = Arc::new(CoinGeckoOracle::new(config.coingecko_config())?);
        let cache = Arc::new(PriceCache::new(config.cache_ttl()));
        let batcher = Arc::new(PriceBatcher::new(cache, oracle, config.batcher_config()));

        let clients = ChainClients::from_config(config)?;
        Ok(Self::new(clients, resolver, batcher, config.engine_config()))
    }

    pub fn resolver(&self) -> &TokenResolver {
        &self.resolver
    }

    pub fn batcher(&self) -> &Arc<PriceBatcher> {
        &self.batcher
    }

    pub fn cache(&self) -> &Arc<PriceCache> {
        self.batcher.cache()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    pub fn clear_cache(&self) {
        self.cache().clear_all();
    }

    pub fn clear_expired(&self) -> usize {
        self.cache().clear_expired()
    }

    pub fn batcher_stats(&self) -> BatcherStats {
        self.batcher.stats()
    }

    /// Values every holding. Never fails as a whole: each holding gets its own
    /// result, in input order.
    pub async fn value(&self, holdings: Vec<Holding>) -> Vec<ValuationResult> {
        let pass_id = Uuid::new_v4().simple().to_string();
        let pass_id = &pass_id[..8];
        let total = holdings.len();
        let mut timer = Timer::start(&format!("valuation pass {}", pass_id));

        let by_family = holdings.iter().counts_by(|h| h.chain.family());
        info!(
            "🚀 [{}] Valuing {} holding(s): {}",
            pass_id,
            total,
            by_family
                .iter()
                .sorted_by_key(|(family, _)| family.to_string())
                .map(|(family, count)| format!("{}={}", family, count))
                .join(", ")
        );

        let mut slots: Vec<Option<ValuationResult>> = vec![None; total];
        let mut prepared = Vec::with_capacity(total);
        for (index, holding) in holdings.into_iter().enumerate() {
            match self.prepare(index, holding) {
                Ok(work) => prepared.push(work),
                Err(result) => {
                    if let Some(error) = result.error() {
                        debug!("⏭️ [{}] Skipping {}: {}", pass_id, result.holding, error);
                    }
                    slots[index] = Some(*result);
                }
            }
        }
        timer.checkpoint("resolve");

        let memo = PriceMemo::default();
        let mut tasks: FuturesUnordered<_> = prepared
            .into_iter()
            .map(|work| self.value_one(work, &memo))
            .collect();

        while let Some((index, result)) = tasks.next().await {
            slots[index] = Some(result);
        }
        drop(tasks);
        timer.checkpoint("balances + prices");

        let results: Vec<ValuationResult> = slots.into_iter().flatten().collect();
        let summary = PortfolioSummary::from_results(&results);
        info!(
            "📊 [{}] ${:.2} across {} holding(s): {} valued ({} stale), {} quantity-only, {} failed, {} distinct price id(s)",
            pass_id,
            summary.total_value_usd,
            summary.holdings,
            summary.valued,
            summary.stale_priced,
            summary.quantity_only,
            summary.failed,
            memo.len()
        );
        if summary.failed > 0 {
            warn!(
                "⚠️ [{}] {} holding(s) could not be valued ({} may succeed on a later pass)",
                pass_id, summary.failed, summary.recoverable
            );
        }

        timer.finish_with_threshold(SLOW_PASS_THRESHOLD);
        results
    }

    /// Offline checks, in order: a client for the chain, the address and token
    /// reference syntax, then the canonical id.
    fn prepare(&self, index: usize, holding: Holding) -> std::result::Result<Prepared, Box<ValuationResult>> {
        let client = match self.clients.get(holding.chain) {
            Some(client) => client,
            None => {
                let error =
                    ValuationError::RpcError(format!("no balance client registered for {}", holding.chain));
                return Err(Box::new(ValuationResult::failed(holding, None, error)));
            }
        };

        if let Err(error) = client
            .validate_address(&holding.address)
            .and_then(|_| client.validate_token_ref(&holding.token_ref))
        {
            return Err(Box::new(ValuationResult::failed(holding, None, error)));
        }

        match self.resolver.resolve_holding(&holding) {
            Ok(token_id) => Ok(Prepared {
                index,
                holding,
                client,
                token_id,
            }),
            Err(error) => Err(Box::new(ValuationResult::failed(holding, None, error))),
        }
    }

    async fn value_one(&self, work: Prepared, memo: &PriceMemo) -> (usize, ValuationResult) {
        let Prepared {
            index,
            holding,
            client,
            token_id,
        } = work;

        // permits are released before the price lookup
        let balance = match self.limiter.acquire(holding.chain).await {
            Ok(_permit) => {
                client
                    .fetch_balance(&holding.address, &holding.token_ref, self.config.balance_timeout)
                    .await
            }
            Err(e) => Err(e),
        };

        let outcome = match balance {
            Err(error) => {
                debug!("❌ Balance for {} failed: {}", holding, error);
                Err(error)
            }
            Ok(quantity) => {
                let price = memo.get_or_start(&token_id, &self.batcher).await;
                Ok(match price {
                    Ok(quote) => Valuation::priced(quantity, &quote),
                    Err(error) => {
                        debug!("💲 No price for {} ({}): {}", holding, token_id, error);
                        Valuation::quantity_only(quantity, error)
                    }
                })
            }
        };

        (
            index,
            ValuationResult {
                holding,
                token_id: Some(token_id),
                outcome,
            },
        )
    }
}
