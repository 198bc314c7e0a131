//! Chain Reader
//!
//! Read-only access to blocks, transactions and receipts on an EVM node.
//! Requests go over any endpoint alloy understands (HTTP, WebSocket or an IPC
//! socket path), are bounded by a timeout, and transient failures are retried
//! with exponential backoff.

use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, U256, U64};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::json_rpc::{RpcParam, RpcReturn};
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Maximum number of retries for a transient failure before giving up
pub const MAX_RETRIES: u32 = 2;

/// Initial backoff delay between retries
pub const INITIAL_BACKOFF_MS: u64 = 200;

/// Maximum backoff delay between retries
pub const MAX_BACKOFF_MS: u64 = 5000;

/// Per-request timeout in milliseconds
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Errors that can occur while reading from the chain
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Transient fetch error: {0}")]
    Transient(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Block {0} not found")]
    BlockNotFound(u64),

    #[error("Transaction {0} not found")]
    TransactionNotFound(TxHash),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Connection failed: {0}")]
    Connection(String),
}

impl ChainError {
    /// Whether the caller may retry the request that produced this error
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChainError::Transient(_) | ChainError::Timeout(_) | ChainError::Connection(_)
        )
    }
}

impl From<TransportError> for ChainError {
    fn from(err: TransportError) -> Self {
        match err {
            RpcError::Transport(kind) => ChainError::Transient(kind.to_string()),
            other => ChainError::Protocol(other.to_string()),
        }
    }
}

/// A transaction as returned inside a hydrated block or by `eth_getTransactionByHash`
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTransaction {
    pub hash: TxHash,
    pub from: Address,
    /// Recipient, `None` for contract creation
    pub to: Option<Address>,
    /// Transferred value in wei
    pub value: U256,
    /// Call data
    pub input: Bytes,
    /// Containing block, `None` while pending
    pub block_number: Option<u64>,
}

/// A block together with its full transactions
#[derive(Debug, Clone, PartialEq)]
pub struct ChainBlock {
    pub number: u64,
    pub transactions: Vec<ChainTransaction>,
}

/// The subset of a receipt the ingestor needs
#[derive(Debug, Clone, PartialEq)]
pub struct ChainReceipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    /// `Some(false)` for a reverted transaction; pre-Byzantium receipts carry no status
    pub success: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: TxHash,
    from: Address,
    #[serde(default)]
    to: Option<Address>,
    value: U256,
    #[serde(default)]
    input: Bytes,
    #[serde(default)]
    block_number: Option<U64>,
}

impl From<RpcTransaction> for ChainTransaction {
    fn from(tx: RpcTransaction) -> Self {
        Self {
            hash: tx.hash,
            from: tx.from,
            to: tx.to,
            value: tx.value,
            input: tx.input,
            block_number: tx.block_number.map(|n| n.to::<u64>()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
    #[serde(default)]
    number: Option<U64>,
    #[serde(default)]
    transactions: Vec<RpcTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    #[serde(default)]
    block_number: Option<U64>,
    #[serde(default)]
    status: Option<U64>,
}

impl From<RpcReceipt> for ChainReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.to::<u64>()),
            success: receipt.status.map(|s| s != U64::ZERO),
        }
    }
}

/// Read-only view of the chain used by the ingestor
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Latest block number known to the node
    async fn current_height(&self) -> Result<u64, ChainError>;

    /// Fetch a block with its full transactions
    async fn block_with_transactions(&self, height: u64) -> Result<ChainBlock, ChainError>;

    /// Fetch a single transaction by hash
    async fn transaction(&self, hash: TxHash) -> Result<ChainTransaction, ChainError>;

    /// Fetch the receipt of a mined transaction
    async fn receipt(&self, hash: TxHash) -> Result<ChainReceipt, ChainError>;
}

/// Configuration for the RPC chain reader
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// HTTP/WS URL or IPC socket path of the node
    pub endpoint: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Retries for transient failures
    pub max_retries: u32,
    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::config::DEFAULT_RPC_URL.to_string(),
            timeout_ms: REQUEST_TIMEOUT_MS,
            max_retries: MAX_RETRIES,
            initial_backoff_ms: INITIAL_BACKOFF_MS,
            max_backoff_ms: MAX_BACKOFF_MS,
        }
    }
}

impl ReaderConfig {
    /// Create a new config with the specified endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Calculate backoff delay for a given retry attempt
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_backoff_ms * 2u64.pow(attempt.min(10));
        Duration::from_millis(delay_ms.min(self.max_backoff_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Expand ~ to home directory in path
pub fn expand_path(path: &str) -> String {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

fn is_url(endpoint: &str) -> bool {
    ["http://", "https://", "ws://", "wss://"]
        .iter()
        .any(|scheme| endpoint.starts_with(scheme))
}

/// Validate that an endpoint looks like something we can connect to
pub fn validate_endpoint(endpoint: &str) -> Result<(), ChainError> {
    if endpoint.trim().is_empty() {
        return Err(ChainError::InvalidEndpoint(
            "Endpoint cannot be empty".to_string(),
        ));
    }

    if !is_url(endpoint) {
        let expanded = expand_path(endpoint);
        if !expanded.ends_with(".ipc") {
            warn!("Endpoint '{}' is neither a URL nor an .ipc path", endpoint);
        }
        if !Path::new(&expanded).exists() {
            return Err(ChainError::InvalidEndpoint(format!(
                "IPC socket not found at path: {}",
                expanded
            )));
        }
    }

    Ok(())
}

/// Chain reader backed by an alloy provider
pub struct RpcChainReader<P> {
    provider: P,
    config: ReaderConfig,
}

/// Connect to the endpoint named in `config`
pub async fn connect(config: ReaderConfig) -> Result<RpcChainReader<impl Provider>, ChainError> {
    validate_endpoint(&config.endpoint)?;
    let endpoint = expand_path(&config.endpoint);

    info!("Connecting to chain endpoint {}", endpoint);
    let provider = ProviderBuilder::new()
        .on_builtin(&endpoint)
        .await
        .map_err(|e| ChainError::Connection(e.to_string()))?;
    info!("Connected to chain endpoint");

    Ok(RpcChainReader::with_provider(provider, config))
}

impl<P: Provider> RpcChainReader<P> {
    /// Wrap an already constructed provider
    pub fn with_provider(provider: P, config: ReaderConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    async fn request_once<Params, R>(&self, method: &'static str, params: Params) -> Result<R, ChainError>
    where
        Params: RpcParam,
        R: RpcReturn,
    {
        let call = self.provider.raw_request(Cow::Borrowed(method), params);
        match timeout(self.config.request_timeout(), call).await {
            Ok(result) => result.map_err(ChainError::from),
            Err(_) => Err(ChainError::Timeout(self.config.timeout_ms)),
        }
    }

    /// Issue a JSON-RPC request, retrying transient failures with backoff
    async fn request<Params, R>(&self, method: &'static str, params: Params) -> Result<R, ChainError>
    where
        Params: RpcParam,
        R: RpcReturn,
    {
        let mut attempt = 0;
        loop {
            match self.request_once(method, params.clone()).await {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff_delay(attempt);
                    warn!(
                        "{} failed ({}), retrying (attempt {}/{}) in {:?}",
                        method,
                        e,
                        attempt + 1,
                        self.config.max_retries,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl<P: Provider> ChainReader for RpcChainReader<P> {
    async fn current_height(&self) -> Result<u64, ChainError> {
        let height: U64 = self.request("eth_blockNumber", ()).await?;
        Ok(height.to::<u64>())
    }

    async fn block_with_transactions(&self, height: u64) -> Result<ChainBlock, ChainError> {
        debug!("Fetching block {}", height);
        let block: Option<RpcBlock> = self
            .request("eth_getBlockByNumber", (U64::from(height), true))
            .await?;
        let block = block.ok_or(ChainError::BlockNotFound(height))?;

        match block.number.map(|n| n.to::<u64>()) {
            Some(number) if number == height => Ok(ChainBlock {
                number,
                transactions: block.transactions.into_iter().map(Into::into).collect(),
            }),
            Some(number) => Err(ChainError::Protocol(format!(
                "Requested block {} but node returned {}",
                height, number
            ))),
            None => Err(ChainError::Protocol(format!(
                "Block {} returned without a number",
                height
            ))),
        }
    }

    async fn transaction(&self, hash: TxHash) -> Result<ChainTransaction, ChainError> {
        let tx: Option<RpcTransaction> = self
            .request("eth_getTransactionByHash", (hash,))
            .await?;
        tx.map(Into::into)
            .ok_or(ChainError::TransactionNotFound(hash))
    }

    async fn receipt(&self, hash: TxHash) -> Result<ChainReceipt, ChainError> {
        let receipt: Option<RpcReceipt> = self
            .request("eth_getTransactionReceipt", (hash,))
            .await?;
        receipt
            .map(Into::into)
            .ok_or(ChainError::TransactionNotFound(hash))
    }
}
