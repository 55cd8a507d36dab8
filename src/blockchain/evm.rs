// src/blockchain/evm.rs
//! Balances on EVM chains over raw JSON-RPC.
//!
//! - Native: `eth_getBalance`, 18 decimals
//! - ERC-20: `eth_call` of `balanceOf(address)`, scaled by the contract's
//!   `decimals()`, which is cached per contract

use super::json_rpc::JsonRpcClient;
use super::ChainBalanceClient;
use crate::error::ValuationError;
use crate::models::{BalanceResult, Chain, ChainFamily, TokenRef};
use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

const BALANCE_OF_SELECTOR: &str = "70a08231";
const DECIMALS_SELECTOR: &str = "0x313ce567";

/// `0x` followed by exactly 40 hex digits.
pub fn is_evm_address(value: &str) -> bool {
    value.len() == 42
        && (value.starts_with("0x") || value.starts_with("0X"))
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

pub fn validate_evm_address(address: &str) -> Result<(), ValuationError> {
    let trimmed = address.trim();
    if trimmed.to_lowercase().ends_with(".eth") {
        return Err(ValuationError::UnsupportedAddressFormat(format!(
            "ENS name '{}' must be resolved to an address first",
            trimmed
        )));
    }
    if is_evm_address(trimmed) {
        Ok(())
    } else {
        Err(ValuationError::InvalidAddress(format!(
            "'{}' is not a 0x-prefixed 40 hex digit address",
            trimmed
        )))
    }
}

/// Parses a hex quantity or 32-byte word (`0x…`) into an f64.
pub fn parse_hex_quantity(raw: &str) -> Result<f64, ValuationError> {
    let digits = raw.trim().trim_start_matches("0x").trim_start_matches("0X");
    if digits.is_empty() {
        return Err(ValuationError::RpcError(format!(
            "empty hex result '{}'",
            raw
        )));
    }
    let padded = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    let bytes = hex::decode(&padded)
        .map_err(|e| ValuationError::RpcError(format!("invalid hex '{}': {}", raw, e)))?;
    Ok(bytes.iter().fold(0f64, |acc, b| acc * 256.0 + *b as f64))
}

fn balance_of_calldata(owner: &str) -> String {
    let owner = owner.trim().trim_start_matches("0x").trim_start_matches("0X");
    format!("0x{}{:0>64}", BALANCE_OF_SELECTOR, owner.to_lowercase())
}

#[derive(Debug)]
pub struct EvmBalanceClient {
    chain: Chain,
    rpc: JsonRpcClient,
    decimals: DashMap<String, u8>,
}

impl EvmBalanceClient {
    pub fn new(chain: Chain, http: Client, endpoints: Vec<String>) -> Self {
        Self {
            chain,
            rpc: JsonRpcClient::new(http, endpoints, chain.name()),
            decimals: DashMap::new(),
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    async fn native_balance(&self, address: &str) -> BalanceResult {
        let result = self
            .rpc
            .call("eth_getBalance", json!([address.trim(), "latest"]))
            .await?;
        let wei = parse_hex_quantity(as_hex_str(&result)?)?;
        Ok(wei / 1e18)
    }

    async fn token_decimals(&self, contract: &str) -> Result<u8, ValuationError> {
        let key = contract.to_lowercase();
        if let Some(decimals) = self.decimals.get(&key) {
            return Ok(*decimals);
        }

        let result = self
            .rpc
            .call(
                "eth_call",
                json!([{ "to": contract, "data": DECIMALS_SELECTOR }, "latest"]),
            )
            .await?;
        let raw = as_hex_str(&result)?;
        if raw.trim_start_matches("0x").is_empty() {
            return Err(ValuationError::RpcError(format!(
                "{} on {} does not implement decimals()",
                contract, self.chain
            )));
        }
        let value = parse_hex_quantity(raw)?;
        if value > u8::MAX as f64 {
            return Err(ValuationError::RpcError(format!(
                "{} on {} reported implausible decimals {}",
                contract, self.chain, value
            )));
        }
        let decimals = value as u8;
        debug!("{} decimals for {} = {}", self.chain, contract, decimals);
        self.decimals.insert(key, decimals);
        Ok(decimals)
    }

    async fn token_balance(&self, address: &str, contract: &str) -> BalanceResult {
        let decimals = self.token_decimals(contract).await?;
        let result = self
            .rpc
            .call(
                "eth_call",
                json!([{ "to": contract, "data": balance_of_calldata(address) }, "latest"]),
            )
            .await?;
        let raw = as_hex_str(&result)?;
        if raw.trim_start_matches("0x").is_empty() {
            return Err(ValuationError::RpcError(format!(
                "{} on {} returned no data for balanceOf",
                contract, self.chain
            )));
        }
        Ok(parse_hex_quantity(raw)? / 10f64.powi(decimals as i32))
    }
}

fn as_hex_str(value: &Value) -> Result<&str, ValuationError> {
    value
        .as_str()
        .ok_or_else(|| ValuationError::RpcError(format!("expected hex string, got {}", value)))
}

#[async_trait]
impl ChainBalanceClient for EvmBalanceClient {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    fn validate_address(&self, address: &str) -> Result<(), ValuationError> {
        validate_evm_address(address)
    }

    fn validate_token_ref(&self, token_ref: &TokenRef) -> Result<(), ValuationError> {
        match token_ref.contract() {
            None => Ok(()),
            Some(contract) if is_evm_address(contract) => Ok(()),
            Some(contract) => Err(ValuationError::InvalidAddress(format!(
                "'{}' is not a valid {} token contract",
                contract, self.chain
            ))),
        }
    }

    async fn query_balance(&self, address: &str, token_ref: &TokenRef) -> BalanceResult {
        match token_ref {
            TokenRef::Native => self.native_balance(address).await,
            TokenRef::Contract(contract) => self.token_balance(address, contract.trim()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_address_validation() {
        assert!(validate_evm_address("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").is_ok());
        assert!(matches!(
            validate_evm_address("vitalik.eth"),
            Err(ValuationError::UnsupportedAddressFormat(_))
        ));
        assert!(matches!(
            validate_evm_address("0x1234"),
            Err(ValuationError::InvalidAddress(_))
        ));
        assert!(matches!(
            validate_evm_address("0xZZb86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            Err(ValuationError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_approx_eq!(parse_hex_quantity("0x1bc16d674ec80000").unwrap(), 2e18);
        assert_approx_eq!(parse_hex_quantity("0x0").unwrap(), 0.0);
        assert_approx_eq!(parse_hex_quantity("0xf").unwrap(), 15.0);
        let word = format!("0x{:0>64}", "0f4240");
        assert_approx_eq!(parse_hex_quantity(&word).unwrap(), 1_000_000.0);
        assert!(parse_hex_quantity("0x").is_err());
        assert!(parse_hex_quantity("0xzz").is_err());
    }

    #[test]
    fn test_balance_of_calldata() {
        let data = balance_of_calldata("0xAbCdEf0000000000000000000000000000000001");
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.starts_with("0x70a08231000000000000000000000000abcdef"));
        assert!(data.ends_with("01"));
    }

    #[test]
    fn test_token_ref_validation() {
        let client = EvmBalanceClient::new(Chain::Base, Client::new(), vec![]);
        assert!(client.validate_token_ref(&TokenRef::Native).is_ok());
        assert!(client
            .validate_token_ref(&TokenRef::from("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"))
            .is_ok());
        assert!(matches!(
            client.validate_token_ref(&TokenRef::from("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v")),
            Err(ValuationError::InvalidAddress(_))
        ));
    }
}
