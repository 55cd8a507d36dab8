// src/error/mod.rs
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Per-holding / per-token failure taxonomy.
///
/// These never escape the engine as faults: every lookup is captured at the
/// smallest scope and surfaced as a typed result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum ValuationError {
    /// Malformed address or token reference, rejected before any network call
    #[error("Invalid Address: {0}")]
    InvalidAddress(String),

    /// Well-formed, but a format this chain client does not handle (testnet, name service, ...)
    #[error("Unsupported Address Format: {0}")]
    UnsupportedAddressFormat(String),

    /// The lookup did not finish inside its own timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// RPC / REST transport or node-side failure
    #[error("RPC Error: {0}")]
    RpcError(String),

    /// No canonical price-oracle id for this (chain, token)
    #[error("Unknown Token: {0}")]
    UnknownToken(String),

    /// The oracle answered but had no price for this token
    #[error("Price Unavailable: {0}")]
    PriceUnavailable(String),

    /// The oracle could not be reached after all retries and no cached price exists
    #[error("Oracle Unavailable: {0}")]
    OracleUnavailable(String),
}

impl ValuationError {
    /// Whether calling `value()` again later could plausibly succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ValuationError::InvalidAddress(_) => false,
            ValuationError::UnsupportedAddressFormat(_) => false,
            ValuationError::Timeout(_) => true,
            ValuationError::RpcError(_) => true,
            ValuationError::UnknownToken(_) => false, // needs a token library entry
            ValuationError::PriceUnavailable(_) => false, // oracle doesn't list it
            ValuationError::OracleUnavailable(_) => true,
        }
    }

    /// Categorizes error for summaries and log routing
    pub fn categorize(&self) -> ErrorCategory {
        match self {
            ValuationError::InvalidAddress(_) | ValuationError::UnsupportedAddressFormat(_) => {
                ErrorCategory::Input
            }
            ValuationError::Timeout(_) | ValuationError::RpcError(_) => ErrorCategory::Network,
            ValuationError::UnknownToken(_) => ErrorCategory::TokenData,
            ValuationError::PriceUnavailable(_) | ValuationError::OracleUnavailable(_) => {
                ErrorCategory::Pricing
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Input,
    Network,
    TokenData,
    Pricing,
}

/// Setup-time failures: configuration, token library loading, client construction.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Config Error: {0}")]
    Config(String),

    #[error("Token Library Error: {0}")]
    TokenLibrary(String),

    #[error("HTTP Client Error: {0}")]
    HttpClient(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse Error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Parse(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<url::ParseError> for EngineError {
    fn from(err: url::ParseError) -> Self {
        EngineError::Config(format!("Invalid URL: {}", err))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::HttpClient(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Circuit breaker guarding the price oracle.
///
/// Opens after `failure_threshold` consecutive failures and stays open for
/// `recovery_timeout`; the first request after that runs half-open.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    state: CircuitBreakerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    Closed,   // Normal operation
    Open,     // Blocking all requests
    HalfOpen, // Testing if service recovered
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            failure_count: 0,
            last_failure_time: None,
            state: CircuitBreakerState::Closed,
        }
    }

    pub fn state(&self) -> CircuitBreakerState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        match self.state {
            CircuitBreakerState::Open => match self.last_failure_time {
                Some(last_failure) => last_failure.elapsed() < self.recovery_timeout,
                None => false,
            },
            _ => false,
        }
    }

    /// Returns whether a request may go through, moving Open -> HalfOpen once
    /// the recovery timeout has passed.
    pub fn allow_request(&mut self) -> bool {
        if self.state == CircuitBreakerState::Open {
            if self.is_open() {
                return false;
            }
            self.state = CircuitBreakerState::HalfOpen;
            info!("Circuit breaker: Transitioning to HalfOpen for testing");
        }
        true
    }

    pub fn record_success(&mut self) {
        if self.state != CircuitBreakerState::Closed {
            info!("Circuit breaker: recovered, state reset to Closed");
        }
        self.failure_count = 0;
        self.state = CircuitBreakerState::Closed;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure_time = Some(Instant::now());

        if self.state == CircuitBreakerState::HalfOpen || self.failure_count >= self.failure_threshold
        {
            self.state = CircuitBreakerState::Open;
            warn!(
                "Circuit breaker: OPENED after {} failures (cooldown {:?})",
                self.failure_count, self.recovery_timeout
            );
        } else {
            debug!(
                "Circuit breaker: Failure recorded ({}/{})",
                self.failure_count, self.failure_threshold
            );
        }
    }
}
