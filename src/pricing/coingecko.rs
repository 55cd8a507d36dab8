// src/pricing/coingecko.rs
//! CoinGecko `/simple/price` client with endpoint failover.

use super::oracle::{OracleError, PriceOracle};
use crate::api::backoff::ApiErrorType;
use crate::error::Result;
use crate::models::CanonicalTokenId;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    pub backup_urls: Vec<String>,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: crate::config::settings::DEFAULT_COINGECKO_API_URL.to_string(),
            backup_urls: Vec::new(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoinGeckoOracle {
    client: Client,
    endpoints: Vec<String>,
    api_key: Option<String>,
}

impl CoinGeckoOracle {
    pub fn new(config: CoinGeckoConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("portfolio-valuation/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut endpoints = vec![config.base_url.trim_end_matches('/').to_string()];
        for url in config.backup_urls {
            let url = url.trim_end_matches('/').to_string();
            if !endpoints.contains(&url) {
                endpoints.push(url);
            }
        }
        info!(
            "🦎 CoinGecko oracle ready ({} endpoint(s), api key: {})",
            endpoints.len(),
            if config.api_key.is_some() { "set" } else { "none" }
        );

        Ok(Self {
            client,
            endpoints,
            api_key: config.api_key,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn fetch_from(
        &self,
        base_url: &str,
        ids: &str,
        token_ids: &[CanonicalTokenId],
    ) -> std::result::Result<HashMap<CanonicalTokenId, f64>, OracleError> {
        let url = format!("{}/simple/price", base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("ids", ids), ("vs_currencies", "usd")]);
        if let Some(key) = &self.api_key {
            let header = if base_url.contains("pro-api.") {
                "x-cg-pro-api-key"
            } else {
                "x-cg-demo-api-key"
            };
            request = request.header(header, key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout(base_url.to_string())
            } else {
                OracleError::Network(format!("{}: {}", base_url, e))
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(OracleError::RateLimited(base_url.to_string()));
        }
        if !status.is_success() {
            return Err(OracleError::HttpStatus {
                status: status.as_u16(),
                endpoint: base_url.to_string(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(format!("{}: {}", base_url, e)))?;
        parse_simple_price(&body, token_ids)
    }
}

/// Extracts `{id: {"usd": price}}` pairs for the requested ids. Ids without a
/// numeric `usd` field are left out.
pub fn parse_simple_price(
    body: &Value,
    token_ids: &[CanonicalTokenId],
) -> std::result::Result<HashMap<CanonicalTokenId, f64>, OracleError> {
    let object = body
        .as_object()
        .ok_or_else(|| OracleError::InvalidResponse("expected a JSON object".to_string()))?;

    // rate limiting is sometimes reported in-band with a 200
    if let Some(code) = object
        .get("status")
        .and_then(|s| s.get("error_code"))
        .and_then(Value::as_u64)
    {
        return Err(if code == 429 {
            OracleError::RateLimited("coingecko".to_string())
        } else {
            OracleError::HttpStatus {
                status: code as u16,
                endpoint: "coingecko".to_string(),
            }
        });
    }

    let prices = token_ids
        .iter()
        .filter_map(|id| {
            object
                .get(id.as_str())
                .and_then(|entry| entry.get("usd"))
                .and_then(Value::as_f64)
                .map(|price| (id.clone(), price))
        })
        .collect();
    Ok(prices)
}

#[async_trait]
impl PriceOracle for CoinGeckoOracle {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn fetch_prices(
        &self,
        token_ids: &[CanonicalTokenId],
    ) -> std::result::Result<HashMap<CanonicalTokenId, f64>, OracleError> {
        if token_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids = token_ids
            .iter()
            .map(CanonicalTokenId::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let mut last_error = OracleError::Network("no oracle endpoint configured".to_string());
        for (index, endpoint) in self.endpoints.iter().enumerate() {
            debug!("📡 CoinGecko request to {} for {} ids", endpoint, token_ids.len());
            match self.fetch_from(endpoint, &ids, token_ids).await {
                Ok(prices) => {
                    if index > 0 {
                        info!("✅ Backup oracle endpoint {} answered", endpoint);
                    }
                    return Ok(prices);
                }
                Err(e) => {
                    let error_type = e.error_type();
                    warn!("⚠️ CoinGecko endpoint {} failed: {}", endpoint, e);
                    if !error_type.should_failover() && error_type != ApiErrorType::Unknown {
                        return Err(e);
                    }
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
