// src/models/mod.rs
//! Core data model shared by the balance clients, the pricing pipeline and the
//! valuation engine.

pub mod chain;
pub mod valuation;

pub use chain::{Chain, ChainFamily};
pub use valuation::{
    BalanceResult, HoldingStatus, PortfolioSummary, PriceQuote, PriceResult, Valuation,
    ValuationResult,
};

use serde::{Deserialize, Serialize};
use std::fmt;

pub const NATIVE_MARKER: &str = "native";

/// Which asset of a wallet a holding refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum TokenRef {
    #[default]
    Native,
    /// ERC-20 contract, SPL mint or Sui coin type, as written by the user.
    Contract(String),
}

impl TokenRef {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "-" || trimmed.eq_ignore_ascii_case(NATIVE_MARKER) {
            TokenRef::Native
        } else {
            TokenRef::Contract(trimmed.to_string())
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, TokenRef::Native)
    }

    pub fn contract(&self) -> Option<&str> {
        match self {
            TokenRef::Native => None,
            TokenRef::Contract(address) => Some(address.as_str()),
        }
    }
}

impl From<String> for TokenRef {
    fn from(value: String) -> Self {
        TokenRef::parse(&value)
    }
}

impl From<&str> for TokenRef {
    fn from(value: &str) -> Self {
        TokenRef::parse(value)
    }
}

impl From<TokenRef> for String {
    fn from(value: TokenRef) -> Self {
        match value {
            TokenRef::Native => NATIVE_MARKER.to_string(),
            TokenRef::Contract(address) => address,
        }
    }
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenRef::Native => f.write_str(NATIVE_MARKER),
            TokenRef::Contract(address) => f.write_str(address),
        }
    }
}

/// One thing to value: an asset held by a wallet on a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Holding {
    pub chain: Chain,
    pub address: String,
    #[serde(default)]
    pub token_ref: TokenRef,
    /// Display hint; only used for resolution when symbol fallback is enabled.
    #[serde(default)]
    pub symbol: String,
}

impl Holding {
    pub fn new(
        chain: Chain,
        address: impl Into<String>,
        token_ref: impl Into<TokenRef>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            chain,
            address: address.into(),
            token_ref: token_ref.into(),
            symbol: symbol.into(),
        }
    }

    pub fn native(chain: Chain, address: impl Into<String>) -> Self {
        Self::new(chain, address, TokenRef::Native, chain.native_symbol())
    }
}

impl fmt::Display for Holding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.address.chars().take(10).collect();
        write!(f, "{}@{}:{}", self.symbol, self.chain, short)
    }
}

/// Key identifying a token to the price oracle (a CoinGecko coin id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalTokenId(String);

impl CanonicalTokenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CanonicalTokenId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_token_ref_native_markers() {
        assert_eq!(TokenRef::parse("NATIVE"), TokenRef::Native);
        assert_eq!(TokenRef::parse(""), TokenRef::Native);
        assert_eq!(TokenRef::parse("-"), TokenRef::Native);
        assert_eq!(
            TokenRef::parse(" 0xAbC "),
            TokenRef::Contract("0xAbC".to_string())
        );
    }

    #[test]
    fn test_holding_deserializes_with_defaults() {
        let holding: Holding =
            serde_json::from_str(r#"{"chain":"btc","address":"bc1qexample"}"#).unwrap();
        assert_eq!(holding.chain, Chain::Bitcoin);
        assert_eq!(holding.token_ref, TokenRef::Native);
        assert_eq!(holding.symbol, "");

        let holding: Holding = serde_json::from_str(
            r#"{"chain":"base","address":"0x1","token_ref":"0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913","symbol":"USDC"}"#,
        )
        .unwrap();
        assert_eq!(
            holding.token_ref.contract(),
            Some("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913")
        );
    }
}
