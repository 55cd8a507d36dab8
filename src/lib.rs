pub mod api; // backoff + pacing shared by the oracle path
pub mod blockchain;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod pricing;
pub mod solana;
pub mod tokens;
pub mod utils;
pub mod valuation;

pub use cache::{CacheStats, PriceCache};
pub use config::Config;
pub use error::{EngineError, ErrorCategory, ValuationError};
pub use models::{
    CanonicalTokenId, Chain, ChainFamily, Holding, HoldingStatus, PortfolioSummary, PriceQuote,
    TokenRef, Valuation, ValuationResult,
};
pub use pricing::{BatcherConfig, PriceBatcher, PriceOracle};
pub use tokens::{TokenLibrary, TokenResolver};
pub use valuation::{EngineConfig, ValuationEngine};
