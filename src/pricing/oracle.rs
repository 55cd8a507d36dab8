// src/pricing/oracle.rs
use crate::api::backoff::ApiErrorType;
use crate::models::CanonicalTokenId;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Oracle-level failure of a whole batch call. Never leaves the batcher.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("HTTP {status} from {endpoint}")]
    HttpStatus { status: u16, endpoint: String },

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl OracleError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, OracleError::RateLimited(_))
            || matches!(self, OracleError::HttpStatus { status: 429, .. })
    }

    pub fn error_type(&self) -> ApiErrorType {
        match self {
            OracleError::RateLimited(_) => ApiErrorType::RateLimit,
            OracleError::HttpStatus { status, .. } => ApiErrorType::from_status(*status),
            OracleError::Timeout(_) => ApiErrorType::Timeout,
            OracleError::Network(_) => ApiErrorType::NetworkError,
            OracleError::InvalidResponse(_) => ApiErrorType::Unknown,
        }
    }
}

/// A batch USD price source. Tokens it has no price for are simply absent
/// from the returned map.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_prices(
        &self,
        token_ids: &[CanonicalTokenId],
    ) -> Result<HashMap<CanonicalTokenId, f64>, OracleError>;
}
