// src/models/valuation.rs
//! Per-holding outcomes produced by a valuation pass and the summary built
//! over them.

use super::{CanonicalTokenId, Holding};
use crate::error::{ErrorCategory, ValuationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw on-chain quantity in display units (already decimal-adjusted).
pub type BalanceResult = Result<f64, ValuationError>;

pub type PriceResult = Result<PriceQuote, ValuationError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub token_id: CanonicalTokenId,
    pub unit_price_usd: f64,
    pub fetched_at: DateTime<Utc>,
    /// Served from an expired cache entry after the oracle could not be reached
    pub is_stale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub quantity: f64,
    pub unit_price_usd: Option<f64>,
    pub value_usd: Option<f64>,
    pub price_is_stale: bool,
    pub price_fetched_at: Option<DateTime<Utc>>,
    pub price_error: Option<ValuationError>,
}

impl Valuation {
    pub fn priced(quantity: f64, quote: &PriceQuote) -> Self {
        Self {
            quantity,
            unit_price_usd: Some(quote.unit_price_usd),
            value_usd: Some(quantity * quote.unit_price_usd),
            price_is_stale: quote.is_stale,
            price_fetched_at: Some(quote.fetched_at),
            price_error: None,
        }
    }

    pub fn quantity_only(quantity: f64, price_error: ValuationError) -> Self {
        Self {
            quantity,
            unit_price_usd: None,
            value_usd: None,
            price_is_stale: false,
            price_fetched_at: None,
            price_error: Some(price_error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldingStatus {
    Valued,
    StalePrice,
    QuantityOnly,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub holding: Holding,
    pub token_id: Option<CanonicalTokenId>,
    pub outcome: Result<Valuation, ValuationError>,
}

impl ValuationResult {
    pub fn failed(holding: Holding, token_id: Option<CanonicalTokenId>, error: ValuationError) -> Self {
        Self {
            holding,
            token_id,
            outcome: Err(error),
        }
    }

    pub fn status(&self) -> HoldingStatus {
        match &self.outcome {
            Err(_) => HoldingStatus::Failed,
            Ok(v) if v.value_usd.is_none() => HoldingStatus::QuantityOnly,
            Ok(v) if v.price_is_stale => HoldingStatus::StalePrice,
            Ok(_) => HoldingStatus::Valued,
        }
    }

    pub fn value_usd(&self) -> Option<f64> {
        self.outcome.as_ref().ok().and_then(|v| v.value_usd)
    }

    pub fn quantity(&self) -> Option<f64> {
        self.outcome.as_ref().ok().map(|v| v.quantity)
    }

    /// The error that kept this holding from a full valuation, if any.
    pub fn error(&self) -> Option<&ValuationError> {
        match &self.outcome {
            Err(e) => Some(e),
            Ok(v) => v.price_error.as_ref(),
        }
    }
}

/// Totals over one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_value_usd: f64,
    pub holdings: usize,
    pub valued: usize,
    pub stale_priced: usize,
    pub quantity_only: usize,
    pub failed: usize,
    pub failures_by_category: HashMap<ErrorCategory, usize>,
    /// Holdings whose missing value could appear on a later pass
    pub recoverable: usize,
}

impl PortfolioSummary {
    pub fn from_results(results: &[ValuationResult]) -> Self {
        let mut summary = PortfolioSummary {
            holdings: results.len(),
            ..Default::default()
        };

        for result in results {
            match result.status() {
                HoldingStatus::Valued => summary.valued += 1,
                HoldingStatus::StalePrice => {
                    // stale-priced holdings still count towards the total
                    summary.valued += 1;
                    summary.stale_priced += 1;
                }
                HoldingStatus::QuantityOnly => summary.quantity_only += 1,
                HoldingStatus::Failed => summary.failed += 1,
            }
            if let Some(value) = result.value_usd() {
                summary.total_value_usd += value;
            }
            if let Some(error) = result.error() {
                if error.is_recoverable() {
                    summary.recoverable += 1;
                }
                *summary
                    .failures_by_category
                    .entry(error.categorize())
                    .or_insert(0) += 1;
            }
        }

        summary
    }

    /// Share of holdings with a USD value, in percent.
    pub fn coverage_percent(&self) -> f64 {
        if self.holdings == 0 {
            return 0.0;
        }
        self.valued as f64 / self.holdings as f64 * 100.0
    }
}
