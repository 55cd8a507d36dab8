// src/models/chain.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chain family: decides which balance client handles a holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainFamily {
    Evm,
    Solana,
    Sui,
    Bitcoin,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFamily::Evm => write!(f, "EVM"),
            ChainFamily::Solana => write!(f, "Solana"),
            ChainFamily::Sui => write!(f, "Sui"),
            ChainFamily::Bitcoin => write!(f, "Bitcoin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Chain {
    Ethereum,
    Arbitrum,
    Base,
    Polygon,
    Bsc,
    Solana,
    Sui,
    Bitcoin,
}

impl Chain {
    pub const ALL: [Chain; 8] = [
        Chain::Ethereum,
        Chain::Arbitrum,
        Chain::Base,
        Chain::Polygon,
        Chain::Bsc,
        Chain::Solana,
        Chain::Sui,
        Chain::Bitcoin,
    ];

    pub fn family(&self) -> ChainFamily {
        match self {
            Chain::Ethereum | Chain::Arbitrum | Chain::Base | Chain::Polygon | Chain::Bsc => {
                ChainFamily::Evm
            }
            Chain::Solana => ChainFamily::Solana,
            Chain::Sui => ChainFamily::Sui,
            Chain::Bitcoin => ChainFamily::Bitcoin,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Arbitrum => "arbitrum",
            Chain::Base => "base",
            Chain::Polygon => "polygon",
            Chain::Bsc => "bsc",
            Chain::Solana => "solana",
            Chain::Sui => "sui",
            Chain::Bitcoin => "bitcoin",
        }
    }

    /// Prefix of the `{PREFIX}_RPC_URL` / `{PREFIX}_RPC_URL_BACKUP` variables.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ETHEREUM",
            Chain::Arbitrum => "ARBITRUM",
            Chain::Base => "BASE",
            Chain::Polygon => "POLYGON",
            Chain::Bsc => "BSC",
            Chain::Solana => "SOLANA",
            Chain::Sui => "SUI",
            Chain::Bitcoin => "BITCOIN",
        }
    }

    /// Public endpoint used when no `{PREFIX}_RPC_URL` is set. For Bitcoin this
    /// is an Esplora REST base rather than a JSON-RPC node.
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Chain::Ethereum => "https://eth.llamarpc.com",
            Chain::Arbitrum => "https://arb1.arbitrum.io/rpc",
            Chain::Base => "https://mainnet.base.org",
            Chain::Polygon => "https://polygon-rpc.com",
            Chain::Bsc => "https://bsc-dataseed.binance.org",
            Chain::Solana => "https://api.mainnet-beta.solana.com",
            Chain::Sui => "https://fullnode.mainnet.sui.io",
            Chain::Bitcoin => "https://blockstream.info/api",
        }
    }

    pub fn default_backup_rpc_urls(&self) -> &'static [&'static str] {
        match self {
            Chain::Ethereum => &[
                "https://rpc.ankr.com/eth",
                "https://eth.public-rpc.com",
                "https://ethereum-rpc.publicnode.com",
            ],
            Chain::Arbitrum => &["https://arbitrum.llamarpc.com", "https://rpc.ankr.com/arbitrum"],
            Chain::Base => &["https://base.llamarpc.com", "https://rpc.ankr.com/base"],
            Chain::Polygon => &["https://polygon.llamarpc.com", "https://rpc.ankr.com/polygon"],
            Chain::Bsc => &[
                "https://bsc-dataseed1.defibit.io",
                "https://bsc-dataseed1.ninicoin.io",
                "https://rpc.ankr.com/bsc",
            ],
            Chain::Solana => &["https://rpc.ankr.com/solana"],
            Chain::Sui => &[],
            Chain::Bitcoin => &["https://mempool.space/api"],
        }
    }

    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Ethereum | Chain::Arbitrum | Chain::Base => "ETH",
            Chain::Polygon => "MATIC",
            Chain::Bsc => "BNB",
            Chain::Solana => "SOL",
            Chain::Sui => "SUI",
            Chain::Bitcoin => "BTC",
        }
    }

    pub fn native_decimals(&self) -> u8 {
        match self.family() {
            ChainFamily::Evm => 18,
            ChainFamily::Solana => 9,
            ChainFamily::Sui => 9,
            ChainFamily::Bitcoin => 8,
        }
    }

    /// Oracle id of the chain's native asset (the `(chain, "native")` convention).
    pub fn native_coin_id(&self) -> &'static str {
        match self {
            Chain::Ethereum | Chain::Arbitrum | Chain::Base => "ethereum",
            Chain::Polygon => "matic-network",
            Chain::Bsc => "binancecoin",
            Chain::Solana => "solana",
            Chain::Sui => "sui",
            Chain::Bitcoin => "bitcoin",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" => Ok(Chain::Ethereum),
            "arbitrum" | "arb" | "arbitrum-one" => Ok(Chain::Arbitrum),
            "base" => Ok(Chain::Base),
            "polygon" | "matic" | "polygon-pos" => Ok(Chain::Polygon),
            "bsc" | "bnb" | "binance-smart-chain" => Ok(Chain::Bsc),
            "solana" | "sol" => Ok(Chain::Solana),
            "sui" => Ok(Chain::Sui),
            "bitcoin" | "btc" => Ok(Chain::Bitcoin),
            other => Err(format!("unsupported chain: {}", other)),
        }
    }
}

impl TryFrom<String> for Chain {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
