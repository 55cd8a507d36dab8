// src/tokens/resolver.rs
use super::{normalize_token_ref, TokenKey, TokenLibrary};
use crate::error::ValuationError;
use crate::models::{CanonicalTokenId, Chain, Holding, TokenRef};
use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Symbol → coin id, used only when contract lookup fails.
static SYMBOL_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("eth", "ethereum"),
        ("btc", "bitcoin"),
        ("bnb", "binancecoin"),
        ("sol", "solana"),
        ("sui", "sui"),
        ("matic", "matic-network"),
        ("pol", "matic-network"),
        ("usdc", "usd-coin"),
        ("usdt", "tether"),
        ("dai", "dai"),
        ("weth", "weth"),
        ("link", "chainlink"),
        ("uni", "uniswap"),
        ("avax", "avalanche-2"),
        ("ftm", "fantom"),
        ("atom", "cosmos"),
        ("dot", "polkadot"),
        ("ada", "cardano"),
        ("slayer", "solayer"),
        ("layer", "solayer"),
        ("jup", "jupiter-exchange-solana"),
        ("susd", "solayer-usd"),
        ("asusdf", "astherus-staked-usdf"),
    ])
});

/// Chain-specific symbol overrides, checked before the global aliases.
fn chain_symbol_alias(chain: Chain, symbol: &str) -> Option<&'static str> {
    match (chain, symbol) {
        (Chain::Base, "degen") => Some("degen-base"),
        (Chain::Solana, "ssol") => Some("solana"),
        (Chain::Bsc, "asbnb") => Some("binancecoin"),
        _ => None,
    }
}

/// Deterministic `(chain, token_ref, symbol) -> CanonicalTokenId` mapping.
#[derive(Debug, Clone)]
pub struct TokenResolver {
    library: Arc<TokenLibrary>,
    symbol_fallback: bool,
}

impl TokenResolver {
    pub fn new(library: Arc<TokenLibrary>, symbol_fallback: bool) -> Self {
        Self {
            library,
            symbol_fallback,
        }
    }

    pub fn library(&self) -> &TokenLibrary {
        &self.library
    }

    pub fn resolve_holding(&self, holding: &Holding) -> Result<CanonicalTokenId, ValuationError> {
        self.resolve(holding.chain, &holding.token_ref, &holding.symbol)
    }

    pub fn resolve(
        &self,
        chain: Chain,
        token_ref: &TokenRef,
        symbol: &str,
    ) -> Result<CanonicalTokenId, ValuationError> {
        let key = normalize_token_ref(chain, token_ref);

        if let Some(id) = self
            .library
            .lookup(chain, &key)
            .and_then(|token| token.coingecko_id.as_deref())
        {
            return Ok(CanonicalTokenId::new(id));
        }

        if key == TokenKey::Native {
            return Ok(CanonicalTokenId::new(chain.native_coin_id()));
        }

        if self.symbol_fallback {
            if let Some(id) = self.resolve_symbol(chain, symbol) {
                debug!("Resolved {} on {} by symbol '{}' -> {}", key, chain, symbol, id);
                return Ok(id);
            }
        }

        Err(ValuationError::UnknownToken(format!(
            "no price id for {} on {}{}",
            key,
            chain,
            if symbol.trim().is_empty() {
                String::new()
            } else {
                format!(" (symbol {})", symbol.trim())
            }
        )))
    }

    fn resolve_symbol(&self, chain: Chain, symbol: &str) -> Option<CanonicalTokenId> {
        let lower = symbol.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }

        if let Some(id) = self
            .library
            .find_by_symbol(chain, &lower)
            .and_then(|token| token.coingecko_id.as_deref())
        {
            return Some(CanonicalTokenId::new(id));
        }

        chain_symbol_alias(chain, &lower)
            .or_else(|| SYMBOL_ALIASES.get(lower.as_str()).copied())
            .map(CanonicalTokenId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolver(symbol_fallback: bool) -> TokenResolver {
        TokenResolver::new(Arc::new(TokenLibrary::predefined()), symbol_fallback)
    }

    #[test]
    fn test_contract_lookup_ignores_checksum_case() {
        let r = resolver(false);
        let a = r
            .resolve(Chain::Ethereum, &"0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".into(), "")
            .unwrap();
        let b = r
            .resolve(Chain::Ethereum, &"0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".into(), "")
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "usd-coin");
    }

    #[test]
    fn test_native_convention() {
        let r = resolver(false);
        assert_eq!(r.resolve(Chain::Base, &TokenRef::Native, "").unwrap().as_str(), "ethereum");
        assert_eq!(r.resolve(Chain::Polygon, &TokenRef::Native, "").unwrap().as_str(), "matic-network");
        assert_eq!(
            r.resolve(
                Chain::Sui,
                &"0x0000000000000000000000000000000000000000000000000000000000000002::sui::SUI".into(),
                ""
            )
            .unwrap()
            .as_str(),
            "sui"
        );
    }

    #[test]
    fn test_symbol_fallback() {
        let unknown = "0x1111111111111111111111111111111111111111";
        let with = resolver(true);
        let without = resolver(false);

        assert_eq!(with.resolve(Chain::Base, &unknown.into(), "DEGEN").unwrap().as_str(), "degen-base");
        assert_eq!(with.resolve(Chain::Ethereum, &unknown.into(), "link").unwrap().as_str(), "chainlink");
        // library symbol beats the alias table
        assert_eq!(with.resolve(Chain::Bsc, &unknown.into(), "asBNB").unwrap().as_str(), "ankr-staked-bnb");
        assert_eq!(
            with.resolve(Chain::Solana, &"So1anaUnknownMint1111111111111111111111111".into(), "sSOL")
                .unwrap()
                .as_str(),
            "solana"
        );

        assert!(matches!(
            without.resolve(Chain::Base, &unknown.into(), "DEGEN"),
            Err(ValuationError::UnknownToken(_))
        ));
        assert!(matches!(
            with.resolve(Chain::Base, &unknown.into(), "NOPE"),
            Err(ValuationError::UnknownToken(_))
        ));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let r = resolver(true);
        let holding = Holding::new(
            Chain::Solana,
            "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM",
            "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN",
            "JUP",
        );
        let first = r.resolve_holding(&holding).unwrap();
        for _ in 0..5 {
            assert_eq!(r.resolve_holding(&holding).unwrap(), first);
        }
        assert_eq!(first.as_str(), "jupiter-exchange-solana");
    }
}
