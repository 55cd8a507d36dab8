// src/solana/mod.rs
//! Solana balances.
//!
//! - Native SOL via `getBalance` (lamports / 1e9)
//! - SPL tokens via the owner's associated token account, derived for both the
//!   SPL Token and Token-2022 programs; whichever exists is read with
//!   `getTokenAccountBalance`, and no ATA at all means a zero balance

pub mod rpc;

pub use rpc::SolanaRpcClient;

use crate::blockchain::ChainBalanceClient;
use crate::error::ValuationError;
use crate::models::{BalanceResult, ChainFamily, TokenRef};
use async_trait::async_trait;
use log::debug;
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use std::str::FromStr;

pub fn parse_pubkey(value: &str) -> Result<Pubkey, ValuationError> {
    let trimmed = value.trim();
    if trimmed.to_lowercase().ends_with(".sol") {
        return Err(ValuationError::UnsupportedAddressFormat(format!(
            "SNS domain '{}' must be resolved to an address first",
            trimmed
        )));
    }
    Pubkey::from_str(trimmed).map_err(|e| {
        ValuationError::InvalidAddress(format!("'{}' is not a base58 public key: {}", trimmed, e))
    })
}

/// ATA candidates for (owner, mint): SPL Token first, then Token-2022.
pub fn associated_token_addresses(owner: &Pubkey, mint: &Pubkey) -> [Pubkey; 2] {
    [
        get_associated_token_address_with_program_id(owner, mint, &spl_token::id()),
        get_associated_token_address_with_program_id(owner, mint, &spl_token_2022::id()),
    ]
}

pub struct SolanaBalanceClient {
    rpc: SolanaRpcClient,
}

impl SolanaBalanceClient {
    pub fn new(primary_endpoint: &str, fallback_endpoints: Vec<String>) -> Self {
        Self {
            rpc: SolanaRpcClient::new(primary_endpoint, fallback_endpoints),
        }
    }

    async fn native_balance(&self, owner: &Pubkey) -> BalanceResult {
        let lamports = self.rpc.get_balance(owner).await?;
        Ok(lamports as f64 / LAMPORTS_PER_SOL as f64)
    }

    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> BalanceResult {
        let candidates = associated_token_addresses(owner, mint);
        let accounts = self.rpc.get_multiple_accounts(&candidates).await?;

        let ata = match candidates
            .iter()
            .zip(accounts.iter())
            .find(|(_, account)| account.is_some())
        {
            Some((ata, _)) => *ata,
            None => {
                debug!("No associated token account for mint {} owned by {}", mint, owner);
                return Ok(0.0);
            }
        };

        let amount = self.rpc.get_token_account_balance(&ata).await?;
        let raw: u128 = amount.amount.parse().map_err(|e| {
            ValuationError::RpcError(format!(
                "unparsable token amount '{}' for {}: {}",
                amount.amount, ata, e
            ))
        })?;
        Ok(crate::utils::scale_amount(raw, amount.decimals))
    }
}

#[async_trait]
impl ChainBalanceClient for SolanaBalanceClient {
    fn family(&self) -> ChainFamily {
        ChainFamily::Solana
    }

    fn validate_address(&self, address: &str) -> Result<(), ValuationError> {
        parse_pubkey(address).map(|_| ())
    }

    fn validate_token_ref(&self, token_ref: &TokenRef) -> Result<(), ValuationError> {
        match token_ref.contract() {
            None => Ok(()),
            Some(mint) => Pubkey::from_str(mint.trim()).map(|_| ()).map_err(|e| {
                ValuationError::InvalidAddress(format!("'{}' is not a valid mint: {}", mint, e))
            }),
        }
    }

    async fn query_balance(&self, address: &str, token_ref: &TokenRef) -> BalanceResult {
        let owner = parse_pubkey(address)?;
        match token_ref.contract() {
            None => self.native_balance(&owner).await,
            Some(mint) => {
                let mint = Pubkey::from_str(mint.trim()).map_err(|e| {
                    ValuationError::InvalidAddress(format!("'{}' is not a valid mint: {}", mint, e))
                })?;
                self.token_balance(&owner, &mint).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
    const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    #[test]
    fn test_address_validation() {
        let client = SolanaBalanceClient::new("https://api.mainnet-beta.solana.com", vec![]);
        assert!(client.validate_address(OWNER).is_ok());
        assert!(matches!(
            client.validate_address("toly.sol"),
            Err(ValuationError::UnsupportedAddressFormat(_))
        ));
        assert!(matches!(
            client.validate_address("0x0000000000000000000000000000000000000001"),
            Err(ValuationError::InvalidAddress(_))
        ));
        assert!(client.validate_token_ref(&TokenRef::from(USDC_MINT)).is_ok());
        assert!(matches!(
            client.validate_token_ref(&TokenRef::from("not-a-mint")),
            Err(ValuationError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_ata_candidates_differ_per_program() {
        let owner = Pubkey::from_str(OWNER).unwrap();
        let mint = Pubkey::from_str(USDC_MINT).unwrap();
        let [classic, token_2022] = associated_token_addresses(&owner, &mint);
        assert_ne!(classic, token_2022);
        assert_eq!(
            classic,
            spl_associated_token_account::get_associated_token_address(&owner, &mint)
        );
    }
}
