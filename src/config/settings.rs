// src/config/settings.rs
use crate::api::backoff::BackoffStrategy;
use crate::error::{EngineError, Result};
use crate::models::Chain;
use crate::pricing::batcher::BatcherConfig;
use crate::pricing::coingecko::CoinGeckoConfig;
use crate::valuation::EngineConfig;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
pub const MAX_CONCURRENCY_CAP: usize = 64;

/// Primary endpoint plus ordered backups for one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoints {
    pub primary: String,
    pub backups: Vec<String>,
}

impl ChainEndpoints {
    /// Primary first, then backups, duplicates dropped.
    pub fn all(&self) -> Vec<String> {
        let mut urls = vec![self.primary.clone()];
        for url in &self.backups {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        urls
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub chain_endpoints: HashMap<Chain, ChainEndpoints>,
    pub coingecko_api_url: String,
    pub coingecko_api_key: Option<String>,
    pub coingecko_backup_urls: Vec<String>,
    pub oracle_request_timeout_secs: u64,
    pub price_cache_ttl_secs: u64,
    pub price_batch_size: usize,
    pub price_batch_collect_ms: u64,
    pub price_rate_limit_delay_ms: u64,
    pub price_max_retries: u32,
    pub price_retry_base_delay_ms: u64,
    /// Fraction of each retry delay randomized either way; 0 disables jitter
    pub price_retry_jitter_percent: f64,
    pub price_rate_limit_cooldown_secs: u64,
    pub price_degraded_failure_threshold: u32,
    pub price_degraded_cooldown_secs: u64,
    pub balance_timeout_secs: u64,
    pub max_concurrency: usize,
    pub per_chain_concurrency: usize,
    pub custom_tokens_path: Option<PathBuf>,
    pub token_symbol_fallback: bool,
    pub log_level: String,
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_list(value: Option<String>) -> Option<Vec<String>> {
    value.map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(|v| v.trim().to_lowercase()) {
        Some(v) if ["1", "true", "yes", "on"].contains(&v.as_str()) => true,
        Some(v) if ["0", "false", "no", "off"].contains(&v.as_str()) => false,
        _ => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or unparsable values fall
    /// back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut chain_endpoints = HashMap::new();
        for chain in Chain::ALL {
            let prefix = chain.env_prefix();
            let primary = lookup(&format!("{}_RPC_URL", prefix))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| chain.default_rpc_url().to_string());
            let backups = parse_list(lookup(&format!("{}_RPC_URL_BACKUP", prefix)))
                .unwrap_or_else(|| {
                    chain
                        .default_backup_rpc_urls()
                        .iter()
                        .map(|s| s.to_string())
                        .collect()
                });
            chain_endpoints.insert(chain, ChainEndpoints { primary, backups });
        }

        Config {
            chain_endpoints,
            coingecko_api_url: lookup("COINGECKO_API_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_COINGECKO_API_URL.to_string()),
            coingecko_api_key: lookup("COINGECKO_API_KEY")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            coingecko_backup_urls: parse_list(lookup("COINGECKO_BACKUP_URLS")).unwrap_or_default(),
            oracle_request_timeout_secs: parse_or(lookup("ORACLE_REQUEST_TIMEOUT_SECS"), 30),
            price_cache_ttl_secs: parse_or(lookup("PRICE_CACHE_TTL_SECS"), 300),
            price_batch_size: parse_or(lookup("PRICE_BATCH_SIZE"), 50),
            price_batch_collect_ms: parse_or(lookup("PRICE_BATCH_COLLECT_MS"), 50),
            price_rate_limit_delay_ms: parse_or(lookup("PRICE_RATE_LIMIT_DELAY_MS"), 1200),
            price_max_retries: parse_or(lookup("PRICE_MAX_RETRIES"), 3),
            price_retry_base_delay_ms: parse_or(lookup("PRICE_RETRY_BASE_DELAY_MS"), 2000),
            price_retry_jitter_percent: parse_or(lookup("PRICE_RETRY_JITTER_PERCENT"), 0.0),
            price_rate_limit_cooldown_secs: parse_or(lookup("PRICE_RATE_LIMIT_COOLDOWN_SECS"), 60),
            price_degraded_failure_threshold: parse_or(
                lookup("PRICE_DEGRADED_FAILURE_THRESHOLD"),
                3,
            ),
            price_degraded_cooldown_secs: parse_or(lookup("PRICE_DEGRADED_COOLDOWN_SECS"), 300),
            balance_timeout_secs: parse_or(lookup("BALANCE_TIMEOUT_SECS"), 10),
            max_concurrency: parse_or(lookup("MAX_CONCURRENCY"), 16),
            per_chain_concurrency: parse_or(lookup("PER_CHAIN_CONCURRENCY"), 4),
            custom_tokens_path: lookup("CUSTOM_TOKENS_PATH")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            token_symbol_fallback: parse_bool(lookup("TOKEN_SYMBOL_FALLBACK"), true),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (chain, endpoints) in &self.chain_endpoints {
            for endpoint in endpoints.all() {
                url::Url::parse(&endpoint).map_err(|e| {
                    EngineError::Config(format!("{} RPC URL '{}' is invalid: {}", chain, endpoint, e))
                })?;
            }
        }
        url::Url::parse(&self.coingecko_api_url)?;
        for backup in &self.coingecko_backup_urls {
            url::Url::parse(backup)?;
        }

        if self.price_cache_ttl_secs == 0 {
            return Err(EngineError::Config("PRICE_CACHE_TTL_SECS must be > 0".to_string()));
        }
        if self.price_batch_size == 0 {
            return Err(EngineError::Config("PRICE_BATCH_SIZE must be > 0".to_string()));
        }
        if self.price_max_retries == 0 {
            return Err(EngineError::Config("PRICE_MAX_RETRIES must be >= 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.price_retry_jitter_percent) {
            return Err(EngineError::Config(
                "PRICE_RETRY_JITTER_PERCENT must be between 0 and 1".to_string(),
            ));
        }
        if self.oracle_request_timeout_secs == 0 {
            return Err(EngineError::Config(
                "ORACLE_REQUEST_TIMEOUT_SECS must be > 0".to_string(),
            ));
        }
        if self.max_concurrency == 0 || self.per_chain_concurrency == 0 {
            return Err(EngineError::Config(
                "MAX_CONCURRENCY and PER_CHAIN_CONCURRENCY must be >= 1".to_string(),
            ));
        }
        if self.balance_timeout_secs == 0 {
            return Err(EngineError::Config("BALANCE_TIMEOUT_SECS must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn validate_and_log(&self) {
        log::info!("⚙️ Configuration loaded:");
        for chain in Chain::ALL {
            if let Some(endpoints) = self.chain_endpoints.get(&chain) {
                log::info!(
                    "   {:<9} {} (+{} backup)",
                    chain.name(),
                    endpoints.primary,
                    endpoints.backups.len()
                );
            }
        }
        log::info!(
            "   oracle: {} (key: {}, backups: {})",
            self.coingecko_api_url,
            if self.coingecko_api_key.is_some() { "set" } else { "none" },
            self.coingecko_backup_urls.len()
        );
        log::info!(
            "   pricing: ttl={}s batch={} pacing={}ms retries={}",
            self.price_cache_ttl_secs,
            self.price_batch_size,
            self.price_rate_limit_delay_ms,
            self.price_max_retries
        );
        log::info!(
            "   balances: timeout={}s concurrency={} per_chain={}",
            self.balance_timeout_secs,
            self.max_concurrency,
            self.per_chain_concurrency
        );
        if self.max_concurrency > MAX_CONCURRENCY_CAP {
            log::warn!(
                "MAX_CONCURRENCY={} exceeds the cap, using {}",
                self.max_concurrency,
                MAX_CONCURRENCY_CAP
            );
        }
    }

    pub fn endpoints(&self, chain: Chain) -> ChainEndpoints {
        self.chain_endpoints
            .get(&chain)
            .cloned()
            .unwrap_or_else(|| ChainEndpoints {
                primary: chain.default_rpc_url().to_string(),
                backups: Vec::new(),
            })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.price_cache_ttl_secs)
    }

    pub fn batcher_config(&self) -> BatcherConfig {
        let mut backoff =
            BackoffStrategy::exponential(Duration::from_millis(self.price_retry_base_delay_ms));
        if self.price_retry_jitter_percent > 0.0 {
            backoff = backoff.with_jitter(self.price_retry_jitter_percent);
        }

        BatcherConfig {
            batch_size: self.price_batch_size,
            collection_delay: Duration::from_millis(self.price_batch_collect_ms),
            rate_limit_delay: Duration::from_millis(self.price_rate_limit_delay_ms),
            request_timeout: Duration::from_secs(self.oracle_request_timeout_secs),
            max_retries: self.price_max_retries,
            backoff,
            rate_limit_cooldown: Duration::from_secs(self.price_rate_limit_cooldown_secs),
            degraded_failure_threshold: self.price_degraded_failure_threshold,
            degraded_cooldown: Duration::from_secs(self.price_degraded_cooldown_secs),
        }
    }

    pub fn coingecko_config(&self) -> CoinGeckoConfig {
        CoinGeckoConfig {
            base_url: self.coingecko_api_url.clone(),
            backup_urls: self.coingecko_backup_urls.clone(),
            api_key: self.coingecko_api_key.clone(),
            request_timeout: Duration::from_secs(self.oracle_request_timeout_secs),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            balance_timeout: Duration::from_secs(self.balance_timeout_secs),
            max_concurrency: self.max_concurrency.min(MAX_CONCURRENCY_CAP),
            per_chain_concurrency: self.per_chain_concurrency,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
