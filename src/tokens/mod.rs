// src/tokens/mod.rs
//! Token identity: the token library and the resolver mapping
//! `(chain, token_ref, symbol)` to a price-oracle id.

pub mod library;
pub mod resolver;

pub use library::{TokenInfo, TokenLibrary};
pub use resolver::TokenResolver;

use crate::blockchain::sui;
use crate::models::{Chain, ChainFamily, TokenRef};
use std::fmt;

/// Normalized lookup key: one spelling per on-chain asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKey {
    Native,
    Contract(String),
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKey::Native => f.write_str("native"),
            TokenKey::Contract(address) => f.write_str(address),
        }
    }
}

/// - EVM: trimmed and lower-cased (checksum casing dropped)
/// - Solana: trimmed only, base58 is case-sensitive
/// - Sui: address part lower-cased and padded to 64 hex digits; any spelling
///   of the SUI coin type collapses to `Native`
pub fn normalize_token_ref(chain: Chain, token_ref: &TokenRef) -> TokenKey {
    let raw = match token_ref {
        TokenRef::Native => return TokenKey::Native,
        TokenRef::Contract(raw) => raw.trim(),
    };

    match chain.family() {
        ChainFamily::Evm => TokenKey::Contract(raw.to_lowercase()),
        ChainFamily::Sui => match sui::normalize_coin_type(raw) {
            Some(_) if sui::is_native_coin_type(raw) => TokenKey::Native,
            Some(normalized) => TokenKey::Contract(normalized),
            None => TokenKey::Contract(raw.to_string()),
        },
        ChainFamily::Solana | ChainFamily::Bitcoin => TokenKey::Contract(raw.to_string()),
    }
}
