// src/pricing/mod.rs
//! USD pricing: the oracle abstraction, the CoinGecko client and the
//! coalescing batcher sitting in front of them.

pub mod batcher;
pub mod coingecko;
pub mod oracle;

pub use batcher::{BatcherConfig, BatcherStats, PriceBatcher};
pub use coingecko::{CoinGeckoConfig, CoinGeckoOracle};
pub use oracle::{OracleError, PriceOracle};
