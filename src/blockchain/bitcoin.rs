// src/blockchain/bitcoin.rs
//! Bitcoin balances from an Esplora-compatible REST API: the sum of confirmed
//! UTXO values at `{api}/address/{addr}/utxo`. Instances refuse that listing
//! (HTTP 400) for addresses with very many outputs; those fall back to the
//! confirmed `chain_stats` at `{api}/address/{addr}`.

use super::json_rpc::{classify_status, with_failover, EndpointFailure};
use super::ChainBalanceClient;
use crate::error::ValuationError;
use crate::models::{BalanceResult, ChainFamily, TokenRef};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

fn is_base58(value: &str) -> bool {
    value.chars().all(|c| BASE58_ALPHABET.contains(c))
}

fn is_bech32_body(value: &str) -> bool {
    let lower = value.to_lowercase();
    // mixed case is invalid bech32
    (value == lower || value == value.to_uppercase())
        && lower.chars().all(|c| BECH32_CHARSET.contains(c))
}

pub fn validate_bitcoin_address(address: &str) -> Result<(), ValuationError> {
    let trimmed = address.trim();
    let lower = trimmed.to_lowercase();

    if lower.starts_with("tb1") || lower.starts_with("bcrt1") {
        return Err(ValuationError::UnsupportedAddressFormat(format!(
            "'{}' is a testnet/regtest address",
            trimmed
        )));
    }
    if let Some(body) = lower.strip_prefix("bc1") {
        let original_body = &trimmed[3..];
        if (11..=71).contains(&body.len()) && is_bech32_body(original_body) {
            return Ok(());
        }
        return Err(ValuationError::InvalidAddress(format!(
            "'{}' is not a valid bech32 address",
            trimmed
        )));
    }

    let legacy_len = (26..=35).contains(&trimmed.len()) && is_base58(trimmed);
    match trimmed.chars().next() {
        Some('1') | Some('3') if legacy_len => Ok(()),
        Some('m') | Some('n') | Some('2') if legacy_len => {
            Err(ValuationError::UnsupportedAddressFormat(format!(
                "'{}' is a testnet address",
                trimmed
            )))
        }
        _ => Err(ValuationError::InvalidAddress(format!(
            "'{}' is not a Bitcoin address",
            trimmed
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub struct Utxo {
    pub value: u64,
    #[serde(default)]
    pub status: UtxoStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct UtxoStatus {
    #[serde(default)]
    pub confirmed: bool,
}

pub fn confirmed_sats(utxos: &[Utxo]) -> u64 {
    utxos
        .iter()
        .filter(|u| u.status.confirmed)
        .map(|u| u.value)
        .sum()
}

#[derive(Debug, Default, Deserialize)]
pub struct TxoStats {
    #[serde(default)]
    pub funded_txo_sum: u64,
    #[serde(default)]
    pub spent_txo_sum: u64,
}

#[derive(Debug, Deserialize)]
pub struct AddressStats {
    #[serde(default)]
    pub chain_stats: TxoStats,
}

pub fn chain_stats_sats(stats: &AddressStats) -> u64 {
    stats
        .chain_stats
        .funded_txo_sum
        .saturating_sub(stats.chain_stats.spent_txo_sum)
}

#[derive(Debug)]
pub struct BitcoinBalanceClient {
    http: Client,
    endpoints: Vec<String>,
}

impl BitcoinBalanceClient {
    pub fn new(http: Client, endpoints: Vec<String>) -> Self {
        let endpoints = endpoints
            .into_iter()
            .map(|e| e.trim_end_matches('/').to_string())
            .collect();
        Self { http, endpoints }
    }

    async fn confirmed_balance(&self, endpoint: &str, address: &str) -> Result<u64, EndpointFailure> {
        let url = format!("{}/address/{}/utxo", endpoint, address);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| EndpointFailure::Failover(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 400 {
            debug!("UTXO listing refused for {} at {}, using chain stats", address, endpoint);
            return self.chain_stats_balance(endpoint, address).await;
        }
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), endpoint));
        }
        let utxos = response
            .json::<Vec<Utxo>>()
            .await
            .map_err(|e| EndpointFailure::Failover(format!("unreadable UTXO list: {}", e)))?;
        Ok(confirmed_sats(&utxos))
    }

    async fn chain_stats_balance(&self, endpoint: &str, address: &str) -> Result<u64, EndpointFailure> {
        let url = format!("{}/address/{}", endpoint, address);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| EndpointFailure::Failover(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), endpoint));
        }
        let stats = response
            .json::<AddressStats>()
            .await
            .map_err(|e| EndpointFailure::Failover(format!("unreadable address stats: {}", e)))?;
        Ok(chain_stats_sats(&stats))
    }
}

#[async_trait]
impl ChainBalanceClient for BitcoinBalanceClient {
    fn family(&self) -> ChainFamily {
        ChainFamily::Bitcoin
    }

    fn validate_address(&self, address: &str) -> Result<(), ValuationError> {
        validate_bitcoin_address(address)
    }

    fn validate_token_ref(&self, token_ref: &TokenRef) -> Result<(), ValuationError> {
        match token_ref.contract() {
            None => Ok(()),
            Some(contract) => Err(ValuationError::UnsupportedAddressFormat(format!(
                "bitcoin has no token contracts (got '{}')",
                contract
            ))),
        }
    }

    async fn query_balance(&self, address: &str, _token_ref: &TokenRef) -> BalanceResult {
        let address = address.trim();
        let sats = with_failover("bitcoin balance", &self.endpoints, move |endpoint| async move {
            self.confirmed_balance(&endpoint, address).await
        })
        .await?;
        Ok(crate::utils::scale_amount(sats as u128, 8))
    }
}
