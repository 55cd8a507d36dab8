// src/solana/rpc.rs
use crate::error::ValuationError;
use log::{debug, info, warn};
use solana_account_decoder::parse_token::UiTokenAmount;
use solana_client::nonblocking::rpc_client::RpcClient as NonBlockingRpcClient;
use solana_sdk::{account::Account, commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::sync::Arc;

const DEFAULT_COMMITMENT: CommitmentConfig = CommitmentConfig::confirmed();

/// Solana RPC with ordered fallback endpoints. Each endpoint is tried once;
/// the caller's timeout bounds the whole walk.
pub struct SolanaRpcClient {
    pub primary_client: Arc<NonBlockingRpcClient>,
    pub fallback_clients: Vec<Arc<NonBlockingRpcClient>>,
}

impl SolanaRpcClient {
    pub fn new(primary_endpoint: &str, fallback_endpoints: Vec<String>) -> Self {
        let primary_client = Arc::new(NonBlockingRpcClient::new_with_commitment(
            primary_endpoint.to_string(),
            DEFAULT_COMMITMENT,
        ));

        let fallback_clients = fallback_endpoints
            .iter()
            .filter(|url| url.as_str() != primary_endpoint)
            .map(|url| {
                Arc::new(NonBlockingRpcClient::new_with_commitment(
                    url.clone(),
                    DEFAULT_COMMITMENT,
                ))
            })
            .collect();

        Self {
            primary_client,
            fallback_clients,
        }
    }

    pub fn endpoint_count(&self) -> usize {
        1 + self.fallback_clients.len()
    }

    async fn execute_with_fallback<F, Fut, T>(
        &self,
        operation_name: &str,
        mut rpc_call_fn: F,
    ) -> Result<T, ValuationError>
    where
        F: FnMut(Arc<NonBlockingRpcClient>) -> Fut,
        Fut: std::future::Future<Output = Result<T, solana_client::client_error::ClientError>> + Send,
        T: Send,
    {
        let mut last_error = match rpc_call_fn(Arc::clone(&self.primary_client)).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                warn!("[Solana RPC - {}] Primary client failed: {}", operation_name, e);
                e
            }
        };

        for (i, fallback_client) in self.fallback_clients.iter().enumerate() {
            debug!("[Solana RPC - {}] Attempting with fallback client #{}", operation_name, i + 1);
            match rpc_call_fn(Arc::clone(fallback_client)).await {
                Ok(result) => {
                    info!("[Solana RPC - {}] Fallback client #{} succeeded.", operation_name, i + 1);
                    return Ok(result);
                }
                Err(e) => {
                    warn!("[Solana RPC - {}] Fallback client #{} failed: {}", operation_name, i + 1, e);
                    last_error = e;
                }
            }
        }

        Err(ValuationError::RpcError(format!(
            "solana {}: all {} endpoint(s) failed, last error: {}",
            operation_name,
            self.endpoint_count(),
            last_error
        )))
    }

    pub async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, ValuationError> {
        self.execute_with_fallback("getBalance", |client| async move {
            client.get_balance(pubkey).await
        })
        .await
    }

    pub async fn get_multiple_accounts(
        &self,
        pubkeys: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, ValuationError> {
        self.execute_with_fallback("getMultipleAccounts", |client| async move {
            client.get_multiple_accounts(pubkeys).await
        })
        .await
    }

    pub async fn get_token_account_balance(
        &self,
        pubkey: &Pubkey,
    ) -> Result<UiTokenAmount, ValuationError> {
        self.execute_with_fallback("getTokenAccountBalance", |client| async move {
            client.get_token_account_balance(pubkey).await
        })
        .await
    }
}
