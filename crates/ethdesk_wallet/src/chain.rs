use std::future::Future;
use std::time::Duration;

use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use ethdesk_core::DeskConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::contract_cache::Contract;
use crate::error::WalletError;
use crate::greeter::Greeter;

/// Receipt summary for a confirmed value transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

/// A confirmed Greeter deployment and the state read back from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub tx_hash: String,
    pub contract: Contract,
}

/// The chain operations the wallet service needs.
///
/// Every method waits for the node; `transfer` and `deploy_greeter` block
/// until the transaction is mined.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn balance_wei(&self, address: Address) -> Result<U256, WalletError>;

    /// Balance rendered as a decimal ether string.
    async fn balance_ether(&self, address: Address) -> Result<String, WalletError> {
        Ok(display_ether(self.balance_wei(address).await?))
    }

    async fn transfer(
        &self,
        sender: &PrivateKeySigner,
        to: Address,
        amount_wei: U256,
    ) -> Result<TransferReceipt, WalletError>;

    /// Deploy the Greeter contract, then read its owner and balance.
    async fn deploy_greeter(
        &self,
        sender: &PrivateKeySigner,
        greeting: &str,
    ) -> Result<Deployment, WalletError>;
}

/// Ether amount without trailing fractional zeros (`1.5`, `0`, `0.000001`).
pub fn display_ether(wei: U256) -> String {
    let formatted = format_ether(wei);
    match formatted.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => formatted,
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC implementation
// ---------------------------------------------------------------------------

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);

/// [`ChainClient`] talking to one JSON-RPC endpoint over HTTP.
///
/// Providers are built per call; signing happens locally with the sender's
/// key.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    url: Url,
    chain_id: Option<u64>,
    request_timeout: Duration,
    receipt_timeout: Duration,
}

impl RpcChainClient {
    pub fn new(rpc_url: &str) -> Result<Self, WalletError> {
        let url = Url::parse(rpc_url)
            .map_err(|e| WalletError::Network(format!("invalid RPC URL {rpc_url}: {e}")))?;
        Ok(Self {
            url,
            chain_id: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        })
    }

    pub fn from_config(config: &DeskConfig) -> Result<Self, WalletError> {
        Ok(Self::new(&config.rpc_url)?
            .with_chain_id(config.chain_id)
            .with_timeouts(
                Duration::from_secs(config.rpc_timeout_secs),
                Duration::from_secs(config.receipt_timeout_secs),
            ))
    }

    /// Pin the chain id instead of asking the node for it.
    pub fn with_chain_id(mut self, chain_id: Option<u64>) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_timeouts(mut self, request: Duration, receipt: Duration) -> Self {
        self.request_timeout = request;
        self.receipt_timeout = receipt;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, WalletError>
    where
        F: Future<Output = Result<T, WalletError>>,
    {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| {
                WalletError::Network(format!(
                    "{what} timed out after {}s",
                    self.request_timeout.as_secs()
                ))
            })?
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn balance_wei(&self, address: Address) -> Result<U256, WalletError> {
        let provider = ProviderBuilder::new().connect_http(self.url.clone());
        let balance = self
            .bounded("eth_getBalance", async {
                provider.get_balance(address).await.map_err(query_error)
            })
            .await?;
        debug!(address = %address, balance = %balance, "balance fetched");
        Ok(balance)
    }

    async fn transfer(
        &self,
        sender: &PrivateKeySigner,
        to: Address,
        amount_wei: U256,
    ) -> Result<TransferReceipt, WalletError> {
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(sender.clone()))
            .connect_http(self.url.clone());

        let mut tx = TransactionRequest::default()
            .with_from(sender.address())
            .with_to(to)
            .with_value(amount_wei);
        if let Some(chain_id) = self.chain_id {
            tx.set_chain_id(chain_id);
        }

        let pending = self
            .bounded("eth_sendRawTransaction", async {
                provider.send_transaction(tx).await.map_err(submit_error)
            })
            .await?;
        let tx_hash = *pending.tx_hash();
        info!(tx_hash = %tx_hash, from = %sender.address(), to = %to, "transfer submitted, waiting for receipt");

        let receipt = pending
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await
            .map_err(|e| receipt_error(tx_hash, e))?;
        if !receipt.status() {
            return Err(WalletError::Transaction(format!(
                "transaction {tx_hash} reverted"
            )));
        }

        Ok(TransferReceipt {
            tx_hash: tx_hash.to_string(),
            block_number: receipt.block_number(),
            gas_used: receipt.gas_used(),
        })
    }

    async fn deploy_greeter(
        &self,
        sender: &PrivateKeySigner,
        greeting: &str,
    ) -> Result<Deployment, WalletError> {
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(sender.clone()))
            .connect_http(self.url.clone());

        let deploy = Greeter::deploy_builder(&provider, greeting.to_string());
        let pending = self
            .bounded("deploy Greeter", async {
                deploy.send().await.map_err(contract_error)
            })
            .await?;
        let tx_hash = *pending.tx_hash();
        info!(tx_hash = %tx_hash, owner = %sender.address(), "deployment submitted, waiting for receipt");

        let receipt = pending
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await
            .map_err(|e| receipt_error(tx_hash, e))?;
        if !receipt.status() {
            return Err(WalletError::Transaction(format!(
                "deployment {tx_hash} reverted"
            )));
        }
        let address = receipt.contract_address().ok_or_else(|| {
            WalletError::Transaction(format!("receipt for {tx_hash} has no contract address"))
        })?;

        let greeter = Greeter::new(address, &provider);
        let owner = self
            .bounded("Greeter.getOwner", async {
                greeter.getOwner().call().await.map_err(contract_error)
            })
            .await?;
        let balance = self
            .bounded("Greeter.getBalance", async {
                greeter.getBalance().call().await.map_err(contract_error)
            })
            .await?;

        info!(contract = %address, owner = %owner, "Greeter deployed");
        Ok(Deployment {
            tx_hash: tx_hash.to_string(),
            contract: Contract {
                address: address.to_string(),
                balance: display_ether(balance),
                owner: owner.to_string(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Read-only queries: node error responses keep their code, everything else
/// is a network failure.
fn query_error(err: TransportError) -> WalletError {
    match err {
        RpcError::ErrorResp(payload) => WalletError::Rpc {
            code: payload.code,
            message: payload.message.to_string(),
        },
        other => WalletError::Network(other.to_string()),
    }
}

/// Transaction submission: node rejections (nonce, funds, gas) are
/// transaction failures; transport failures stay network errors.
fn submit_error(err: TransportError) -> WalletError {
    match err {
        RpcError::ErrorResp(payload) => WalletError::Transaction(format!(
            "rejected by node ({}): {}",
            payload.code, payload.message
        )),
        RpcError::Transport(kind) => WalletError::Network(kind.to_string()),
        other => WalletError::Transaction(other.to_string()),
    }
}

fn receipt_error(tx_hash: TxHash, err: impl std::fmt::Display) -> WalletError {
    WalletError::Transaction(format!("no receipt for {tx_hash}: {err}"))
}

fn contract_error(err: alloy::contract::Error) -> WalletError {
    match err {
        alloy::contract::Error::TransportError(inner) => submit_error(inner),
        other => WalletError::Transaction(other.to_string()),
    }
}
