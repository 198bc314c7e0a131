//! Redis Publisher
//!
//! Publishes newly recorded donations to a Redis pub/sub channel as JSON, so
//! downstream consumers can react to them without polling the query interface.

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::donation::Donation;

/// Default Redis channel for publishing donations
pub const DEFAULT_CHANNEL: &str = "donations";

/// Errors that can occur during publishing
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Donation message format for Redis publication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DonationMessage {
    /// Transaction hash with 0x prefix, also the donation id
    pub id: String,
    /// Sender address with 0x prefix
    pub from: String,
    /// Recipient address with 0x prefix
    pub to: String,
    /// Donated amount in wei as decimal string
    pub value: String,
    /// Donated amount in ether as decimal string
    pub value_eth: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// `protocol` or `heuristic` when a message is present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_source: Option<String>,
    pub message_weight: f64,
    pub block_number: u64,
    /// Unix timestamp in milliseconds when the donation was ingested
    pub timestamp: u64,
    /// Original call data with 0x prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl DonationMessage {
    pub fn from_donation(donation: &Donation) -> Self {
        DonationMessage {
            id: format!("{:#x}", donation.transaction_hash),
            from: format!("{:#x}", donation.from),
            to: format!("{:#x}", donation.to),
            value: donation.value_wei.to_string(),
            value_eth: donation.value_display.clone(),
            message: donation.message.clone(),
            message_source: donation.message_source.map(|s| s.as_str().to_string()),
            message_weight: donation.message_weight,
            block_number: donation.block_number,
            timestamp: donation.timestamp,
            data: donation
                .raw_data
                .as_ref()
                .map(|d| format!("0x{}", hex::encode(d))),
        }
    }

    /// Serialize the message to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a message from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Redis publisher for donation messages
pub struct DonationPublisher {
    connection: MultiplexedConnection,
    channel: String,
}

impl DonationPublisher {
    /// Create a new publisher with a Redis connection
    ///
    /// # Arguments
    /// * `connection` - An established Redis multiplexed connection
    /// * `channel` - The pub/sub channel name to publish to
    pub fn new(connection: MultiplexedConnection, channel: impl Into<String>) -> Self {
        Self {
            connection,
            channel: channel.into(),
        }
    }

    /// Open a connection to `redis_url` and publish to `channel`
    pub async fn connect(redis_url: &str, channel: impl Into<String>) -> Result<Self, PublishError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self::new(connection, channel))
    }

    /// Publish a donation to Redis
    ///
    /// # Returns
    /// The number of subscribers that received the message
    pub async fn publish(&mut self, donation: &Donation) -> Result<i64, PublishError> {
        self.publish_message(&DonationMessage::from_donation(donation))
            .await
    }

    /// Publish a pre-formatted message to Redis
    pub async fn publish_message(&mut self, message: &DonationMessage) -> Result<i64, PublishError> {
        let json = message.to_json()?;
        let subscribers: i64 = self.connection.publish(&self.channel, &json).await?;
        Ok(subscribers)
    }

    /// Get the channel name
    pub fn channel(&self) -> &str {
        &self.channel
    }
}
