// src/tokens/library.rs
//! Predefined token table plus optional user tokens from a JSON file.
//!
//! The custom file is a JSON array of objects shaped like [`TokenInfo`]
//! (`chain_name` is accepted for `chain`). Predefined entries win when a
//! custom entry names the same contract.

use super::{normalize_token_ref, TokenKey};
use crate::error::{EngineError, Result};
use crate::models::{Chain, TokenRef};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

fn default_decimals() -> u8 {
    18
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    #[serde(alias = "chain_name")]
    pub chain: Chain,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default)]
    pub coingecko_id: Option<String>,
    #[serde(default)]
    pub is_predefined: bool,
}

impl TokenInfo {
    fn predefined(
        chain: Chain,
        symbol: &str,
        name: &str,
        contract_address: Option<&str>,
        decimals: u8,
        coingecko_id: &str,
    ) -> Self {
        Self {
            chain,
            symbol: symbol.to_string(),
            name: name.to_string(),
            contract_address: contract_address.map(str::to_string),
            decimals,
            coingecko_id: Some(coingecko_id.to_string()),
            is_predefined: true,
        }
    }

    pub fn token_ref(&self) -> TokenRef {
        match &self.contract_address {
            Some(address) => TokenRef::parse(address),
            None => TokenRef::Native,
        }
    }

    pub fn key(&self) -> TokenKey {
        normalize_token_ref(self.chain, &self.token_ref())
    }
}

type Row = (Chain, &'static str, &'static str, Option<&'static str>, u8, &'static str);

const PREDEFINED: &[Row] = &[
    (Chain::Ethereum, "ETH", "Ethereum", None, 18, "ethereum"),
    (Chain::Ethereum, "USDC", "USD Coin", Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), 6, "usd-coin"),
    (Chain::Ethereum, "USDT", "Tether USD", Some("0xdAC17F958D2ee523a2206206994597C13D831ec7"), 6, "tether"),
    (Chain::Ethereum, "WETH", "Wrapped Ether", Some("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"), 18, "weth"),
    (Chain::Arbitrum, "ETH", "Ethereum", None, 18, "ethereum"),
    (Chain::Arbitrum, "USDC", "USD Coin", Some("0xaf88d065e77c8cC2239327C5EDb3A432268e5831"), 6, "usd-coin"),
    (Chain::Arbitrum, "USDT", "Tether USD", Some("0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9"), 6, "tether"),
    (Chain::Base, "ETH", "Ethereum", None, 18, "ethereum"),
    (Chain::Base, "USDC", "USD Coin", Some("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"), 6, "usd-coin"),
    (Chain::Base, "USDT", "Tether USD", Some("0xfde4C96c8593536E31F229EA8f37b2ADa2699bb2"), 6, "tether"),
    (Chain::Polygon, "MATIC", "Polygon", None, 18, "matic-network"),
    (Chain::Polygon, "USDC", "USD Coin", Some("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359"), 6, "usd-coin"),
    (Chain::Bsc, "BNB", "BNB", None, 18, "binancecoin"),
    (Chain::Bsc, "USDT", "Tether USD", Some("0x55d398326f99059fF775485246999027B3197955"), 18, "tether"),
    (Chain::Bsc, "USDC", "USD Coin", Some("0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d"), 18, "usd-coin"),
    (Chain::Bsc, "BUSD", "Binance USD", Some("0xe9e7CEA3DedcA5984780Bafc599bD69ADd087D56"), 18, "binance-usd"),
    (Chain::Bsc, "USDF", "USD Fiat", Some("0x05faf555522Fa3F93959F86B41A3808666093210"), 18, "usd-fiat"),
    (Chain::Bsc, "ASBNB", "Ankr Staked BNB", Some("0x52F24a5e03aee338Da5fd9Df68D2b6FAe1178827"), 18, "ankr-staked-bnb"),
    (Chain::Bsc, "STKBNB", "Staked BNB", Some("0xc2E9d07F66A89c44062459A47a0D2Dc038E4fb16"), 18, "staked-bnb"),
    (Chain::Bsc, "CAKE", "PancakeSwap", Some("0x0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82"), 18, "pancakeswap-token"),
    (Chain::Bsc, "XVS", "Venus", Some("0xcF6BB5389c92Bdda8a3747Ddb454cB7a64626C63"), 18, "venus"),
    (Chain::Bsc, "ALPACA", "Alpaca Finance", Some("0x8F0528cE5eF7B51152A59745bEfDD91D97091d2F"), 18, "alpaca-finance"),
    (Chain::Bsc, "ETH", "Binance-Peg Ethereum", Some("0x2170Ed0880ac9A755fd29B2688956BD959F933F8"), 18, "ethereum"),
    (Chain::Bsc, "BTCB", "Binance-Peg BTC", Some("0x7130d2A12B9BCbFAe4f2634d864A1Ee1Ce3Ead9c"), 18, "bitcoin"),
    (Chain::Bsc, "ADA", "Binance-Peg Cardano", Some("0x3EE2200Efb3400fAbB9AacF31297cBdD1d435D47"), 18, "cardano"),
    (Chain::Bsc, "DOT", "Binance-Peg Polkadot", Some("0x7083609fCE4d1d8Dc0C979AAb8c869Ea2C873402"), 18, "polkadot"),
    (Chain::Bsc, "DOGE", "Binance-Peg Dogecoin", Some("0xbA2aE424d960c26247Dd6c32edC70B295c744C43"), 8, "dogecoin"),
    (Chain::Bsc, "SHIB", "Binance-Peg SHIBA INU", Some("0x2859e4544C4bB03966803b044A93563Bd2D0DD4D"), 18, "shiba-inu"),
    (Chain::Bsc, "SLP", "Smooth Love Potion", Some("0x070a08BeEF8d36734dD67A491202fF35a6A16d97"), 0, "smooth-love-potion"),
    (Chain::Solana, "SOL", "Solana", None, 9, "solana"),
    (Chain::Solana, "WSOL", "Wrapped SOL", Some("So11111111111111111111111111111111111111112"), 9, "solana"),
    (Chain::Solana, "USDC", "USD Coin", Some("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"), 6, "usd-coin"),
    (Chain::Solana, "USDT", "Tether USD", Some("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"), 6, "tether"),
    (Chain::Solana, "JUP", "Jupiter", Some("JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN"), 6, "jupiter-exchange-solana"),
    (Chain::Solana, "RAY", "Raydium", Some("4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R"), 6, "raydium"),
    (Chain::Solana, "BONK", "Bonk", Some("DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263"), 5, "bonk"),
    (Chain::Solana, "WIF", "dogwifhat", Some("EKpQGSJtjMFqKZ9KQanSqYXRcF8fBopzLHYxdM65zcjm"), 6, "dogwifhat"),
    (Chain::Solana, "PYTH", "Pyth Network", Some("HZ1JovNiVvGrGNiiYvEozEVgZ58xaU3RKwX8eACQBCt3"), 6, "pyth-network"),
    (Chain::Solana, "JTO", "Jito", Some("jtojtomepa8beP8AuQc6eXt5FriJwfFMwQx2v2f9mCL"), 9, "jito-governance-token"),
    (Chain::Solana, "ORCA", "Orca", Some("orcaEKTdK7LKz57vaAYr9QeNsVEPfiu6QeMU1kektZE"), 6, "orca"),
    (Chain::Solana, "LAYER", "Solayer", Some("LAYER4xPpTCb3QL8S9u41EAhAX7mhBn8Q6xMTwY2Yzc"), 9, "solayer"),
    (Chain::Solana, "POPCAT", "Popcat", Some("7GCihgDB8fe6KNjn2MYtkzZcRjQy3t9GHdC8uHYmW2hr"), 9, "popcat"),
    (Chain::Solana, "MEW", "cat in a dogs world", Some("MEW1gQWJ3nEXg2qgERiKu7FAFj79PHvQVREQUzScPP5"), 5, "cat-in-a-dogs-world"),
    (Chain::Solana, "GRASS", "Grass", Some("Grass7B4RdKfBCjTKgSqnXkqjwiGvQyFbuSCUJr3XXjs"), 9, "grass"),
    (Chain::Solana, "HONEY", "Hivemapper", Some("4vMsoUT2BWatFweudnQM1xedRLfJgJ7hswhcpz4xgBTy"), 9, "hivemapper"),
    (Chain::Solana, "PENGU", "Pudgy Penguins", Some("2zMMhcVQEXDtdE6vsFS7S7D5oUodfJHE8vd1gnBouauv"), 6, "pudgy-penguins"),
    (Chain::Sui, "SUI", "Sui", None, 9, "sui"),
    (Chain::Sui, "USDC", "USD Coin", Some("0xdba34672e30cb065b1f93e3ab55318768fd6fef66c15942c9f7cb846e2f900e7::usdc::USDC"), 6, "usd-coin"),
    (Chain::Sui, "USDT", "Tether USD", Some("0xc060006111016b8a020ad5b33834984a437aaa7d3c74c18e09a95d48aceab08c::coin::COIN"), 6, "tether"),
    (Chain::Bitcoin, "BTC", "Bitcoin", None, 8, "bitcoin"),
];

#[derive(Debug, Clone, Default)]
pub struct TokenLibrary {
    tokens: Vec<TokenInfo>,
    by_key: HashMap<(Chain, TokenKey), usize>,
    by_symbol: HashMap<(Chain, String), usize>,
}

impl TokenLibrary {
    pub fn predefined() -> Self {
        let mut library = Self::default();
        for (chain, symbol, name, contract, decimals, coingecko_id) in PREDEFINED {
            library.insert(TokenInfo::predefined(
                *chain,
                symbol,
                name,
                *contract,
                *decimals,
                coingecko_id,
            ));
        }
        library
    }

    /// Predefined tokens, merged with the custom file when a path is given.
    /// A path that does not exist yet is not an error.
    pub fn load(custom_path: Option<&Path>) -> Result<Self> {
        let mut library = Self::predefined();
        if let Some(path) = custom_path {
            if path.exists() {
                let raw = std::fs::read_to_string(path)?;
                let custom = parse_custom_tokens(&raw).map_err(|e| {
                    EngineError::TokenLibrary(format!("{}: {}", path.display(), e))
                })?;
                let added = library.merge(custom);
                info!("📚 Loaded {} custom token(s) from {}", added, path.display());
            } else {
                warn!("Custom token file {} not found, using predefined tokens only", path.display());
            }
        }
        info!("📚 Token library ready with {} tokens", library.len());
        Ok(library)
    }

    /// Adds custom tokens; returns how many were taken.
    pub fn merge(&mut self, custom: Vec<TokenInfo>) -> usize {
        let mut added = 0;
        for mut token in custom {
            token.is_predefined = false;
            if self.by_key.contains_key(&(token.chain, token.key())) {
                debug!(
                    "Skipping custom {} on {}: contract already in the library",
                    token.symbol, token.chain
                );
                continue;
            }
            self.insert(token);
            added += 1;
        }
        added
    }

    fn insert(&mut self, token: TokenInfo) {
        let index = self.tokens.len();
        self.by_key.entry((token.chain, token.key())).or_insert(index);
        self.by_symbol
            .entry((token.chain, token.symbol.to_uppercase()))
            .or_insert(index);
        self.tokens.push(token);
    }

    pub fn lookup(&self, chain: Chain, key: &TokenKey) -> Option<&TokenInfo> {
        self.by_key
            .get(&(chain, key.clone()))
            .map(|index| &self.tokens[*index])
    }

    pub fn find_by_symbol(&self, chain: Chain, symbol: &str) -> Option<&TokenInfo> {
        self.by_symbol
            .get(&(chain, symbol.trim().to_uppercase()))
            .map(|index| &self.tokens[*index])
    }

    pub fn tokens(&self, chain: Option<Chain>) -> Vec<&TokenInfo> {
        self.tokens
            .iter()
            .filter(|t| chain.map_or(true, |c| t.chain == c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

pub fn parse_custom_tokens(raw: &str) -> Result<Vec<TokenInfo>> {
    Ok(serde_json::from_str(raw)?)
}
