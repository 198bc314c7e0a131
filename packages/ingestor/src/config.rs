//! Ingestor Configuration
//!
//! Typed settings for the ingestor binary, loadable from the process
//! environment or a dotenv file.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use alloy::primitives::Address;
use thiserror::Error;

use crate::chain::{ReaderConfig, MAX_RETRIES, REQUEST_TIMEOUT_MS};
use crate::filter::{MessageTags, TagParseError};
use crate::ingestor::LOOKBACK_BLOCKS;
use crate::publisher::DEFAULT_CHANNEL;

/// Public Base Sepolia endpoint
pub const DEFAULT_RPC_URL: &str = "https://sepolia.base.org";

/// Seconds between periodic scans
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid message tags: {0}")]
    Tags(#[from] TagParseError),

    #[error("Failed to read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

/// Configuration for the donation ingestor
#[derive(Debug, Clone)]
pub struct IngestorConfig {
    /// Node endpoint (HTTP/WS URL or IPC path)
    pub rpc_url: String,
    /// Address whose incoming payments are donations
    pub donation_address: Option<Address>,
    /// Blocks behind the head scanned on the first cycle
    pub lookback_blocks: u64,
    /// Seconds between periodic scans
    pub scan_interval_secs: u64,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Retries for transient RPC failures
    pub max_retries: u32,
    /// Selectors decoded as protocol messages
    pub message_tags: MessageTags,
    /// Redis URL for publishing new donations; publishing is off when unset
    pub redis_url: Option<String>,
    /// Redis pub/sub channel
    pub channel: String,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            donation_address: None,
            lookback_blocks: LOOKBACK_BLOCKS,
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            max_retries: MAX_RETRIES,
            message_tags: MessageTags::default(),
            redis_url: None,
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

impl IngestorConfig {
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    pub fn with_donation_address(mut self, address: Address) -> Self {
        self.donation_address = Some(address);
        self
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from a dotenv file, ignoring the process environment
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let vars = dotenvy::from_path_iter(path)?.collect::<Result<HashMap<_, _>, _>>()?;
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Build a config from a key lookup; unset keys keep their defaults
    /// except `DONATION_ADDRESS`, which is required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(url) = get("RPC_URL").or_else(|| get("RPC_URL_BASE")) {
            config.rpc_url = url;
        }

        let address = get("DONATION_ADDRESS").ok_or(ConfigError::Missing("DONATION_ADDRESS"))?;
        config.donation_address = Some(address.parse().map_err(|_| ConfigError::Invalid {
            key: "DONATION_ADDRESS",
            value: address.clone(),
        })?);

        if let Some(v) = get("LOOKBACK_BLOCKS") {
            config.lookback_blocks = parse_number("LOOKBACK_BLOCKS", v)?;
        }
        if let Some(v) = get("SCAN_INTERVAL_SECS") {
            config.scan_interval_secs = parse_number("SCAN_INTERVAL_SECS", v)?;
            if config.scan_interval_secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "SCAN_INTERVAL_SECS",
                    value: "0".to_string(),
                });
            }
        }
        if let Some(v) = get("RPC_TIMEOUT_MS") {
            config.request_timeout_ms = parse_number("RPC_TIMEOUT_MS", v)?;
        }
        if let Some(v) = get("RPC_MAX_RETRIES") {
            config.max_retries = parse_number("RPC_MAX_RETRIES", v)?;
        }
        if let Some(v) = get("MESSAGE_TAGS") {
            config.message_tags = MessageTags::parse_list(&v)?;
        }
        config.redis_url = get("REDIS_URL");
        if let Some(channel) = get("REDIS_CHANNEL") {
            config.channel = channel;
        }

        Ok(config)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Settings for the chain reader
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            endpoint: self.rpc_url.clone(),
            timeout_ms: self.request_timeout_ms,
            max_retries: self.max_retries,
            ..ReaderConfig::default()
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}
