// src/blockchain/sui.rs
//! Sui balances via `suix_getBalance`; the coin type string is the token ref.

use super::json_rpc::JsonRpcClient;
use super::ChainBalanceClient;
use crate::error::ValuationError;
use crate::models::{BalanceResult, ChainFamily, TokenRef};
use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

pub const SUI_NATIVE_COIN_TYPE: &str = "0x2::sui::SUI";

/// Decimals of coin types whose metadata lookup is not worth a round trip.
const KNOWN_DECIMALS: &[(&str, u8)] = &[
    (SUI_NATIVE_COIN_TYPE, 9),
    (
        "0xdba34672e30cb065b1f93e3ab55318768fd6fef66c15942c9f7cb846e2f900e7::usdc::USDC",
        6,
    ),
    (
        "0xc060006111016b8a020ad5b33834984a437aaa7d3c74c18e09a95d48aceab08c::coin::COIN",
        6,
    ),
    (
        "0x5d4b302506645c37ff133b98c4b50a5ae14841659738d6d733d59d0d217a93bf::coin::COIN",
        6,
    ),
    (
        "0x7926cdedd3053cffe30d21933d78ed4a60d6d05f470985371d20e3135d93b1eb::usdt::USDT",
        6,
    ),
    (
        "0xaf8cd5edc19c4512f4259f0bee101a40d41ebed738ade5874359610ef8eeced5::coin::COIN",
        8,
    ),
];

fn is_hex_account(value: &str) -> bool {
    let digits = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(digits) => digits,
        None => return false,
    };
    (1..=64).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Canonical spelling of a coin type: address lower-cased and left-padded to
/// 64 hex digits, module and struct names untouched.
pub fn normalize_coin_type(coin_type: &str) -> Option<String> {
    let mut parts = coin_type.trim().splitn(3, "::");
    let address = parts.next()?;
    let module = parts.next()?;
    let name = parts.next()?;
    if !is_hex_account(address) || module.is_empty() || name.is_empty() {
        return None;
    }
    let digits = address[2..].to_lowercase();
    Some(format!("0x{:0>64}::{}::{}", digits, module, name))
}

pub fn is_native_coin_type(coin_type: &str) -> bool {
    match (normalize_coin_type(coin_type), normalize_coin_type(SUI_NATIVE_COIN_TYPE)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Table lookup, then the `usdc`/`usdt` naming heuristic, else 9.
pub fn fallback_decimals(coin_type: &str) -> u8 {
    if let Some(normalized) = normalize_coin_type(coin_type) {
        for (known, decimals) in KNOWN_DECIMALS {
            if normalize_coin_type(known).as_deref() == Some(normalized.as_str()) {
                return *decimals;
            }
        }
    }
    let lower = coin_type.to_lowercase();
    if lower.contains("usdc") || lower.contains("usdt") {
        6
    } else {
        9
    }
}

pub fn validate_sui_address(address: &str) -> Result<(), ValuationError> {
    let trimmed = address.trim();
    if trimmed.to_lowercase().ends_with(".sui") {
        return Err(ValuationError::UnsupportedAddressFormat(format!(
            "SuiNS name '{}' must be resolved to an address first",
            trimmed
        )));
    }
    if is_hex_account(trimmed) {
        Ok(())
    } else {
        Err(ValuationError::InvalidAddress(format!(
            "'{}' is not a 0x-prefixed Sui address",
            trimmed
        )))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuiBalance {
    total_balance: String,
}

#[derive(Debug, Deserialize)]
struct SuiCoinMetadata {
    decimals: u8,
}

#[derive(Debug)]
pub struct SuiBalanceClient {
    rpc: JsonRpcClient,
    decimals: DashMap<String, u8>,
}

impl SuiBalanceClient {
    pub fn new(http: Client, endpoints: Vec<String>) -> Self {
        Self {
            rpc: JsonRpcClient::new(http, endpoints, "sui"),
            decimals: DashMap::new(),
        }
    }

    async fn coin_decimals(&self, coin_type: &str) -> u8 {
        if let Some(decimals) = self.decimals.get(coin_type) {
            return *decimals;
        }
        let metadata: Result<Option<SuiCoinMetadata>, _> = self
            .rpc
            .call_typed("suix_getCoinMetadata", json!([coin_type]))
            .await;
        let decimals = match metadata {
            Ok(Some(metadata)) => metadata.decimals,
            Ok(None) => fallback_decimals(coin_type),
            Err(e) => {
                debug!("coin metadata for {} unavailable ({}), using fallback", coin_type, e);
                // not cached, the node may answer next time
                return fallback_decimals(coin_type);
            }
        };
        self.decimals.insert(coin_type.to_string(), decimals);
        decimals
    }
}

#[async_trait]
impl ChainBalanceClient for SuiBalanceClient {
    fn family(&self) -> ChainFamily {
        ChainFamily::Sui
    }

    fn validate_address(&self, address: &str) -> Result<(), ValuationError> {
        validate_sui_address(address)
    }

    fn validate_token_ref(&self, token_ref: &TokenRef) -> Result<(), ValuationError> {
        match token_ref.contract() {
            None => Ok(()),
            Some(coin_type) if normalize_coin_type(coin_type).is_some() => Ok(()),
            Some(coin_type) => Err(ValuationError::InvalidAddress(format!(
                "'{}' is not a Sui coin type (0x…::module::Name)",
                coin_type
            ))),
        }
    }

    async fn query_balance(&self, address: &str, token_ref: &TokenRef) -> BalanceResult {
        let coin_type = token_ref
            .contract()
            .map(str::trim)
            .unwrap_or(SUI_NATIVE_COIN_TYPE);

        let balance: SuiBalance = self
            .rpc
            .call_typed("suix_getBalance", json!([address.trim(), coin_type]))
            .await?;
        let raw: u128 = balance.total_balance.parse().map_err(|e| {
            ValuationError::RpcError(format!(
                "unparsable totalBalance '{}': {}",
                balance.total_balance, e
            ))
        })?;

        let decimals = if is_native_coin_type(coin_type) {
            9
        } else {
            self.coin_decimals(coin_type).await
        };
        Ok(crate::utils::scale_amount(raw, decimals))
    }
}
