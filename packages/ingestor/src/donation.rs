//! Donation record

use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, Bytes, TxHash, U256};

use crate::chain::ChainTransaction;
use crate::extractor::{ExtractedMessage, MessageSource};
use crate::weight::{format_ether, message_weight};

/// A detected payment to the monitored address.
///
/// Built once when the transaction is first seen and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Donation {
    /// Source transaction hash, also the ledger key
    pub transaction_hash: TxHash,
    pub from: Address,
    pub to: Address,
    /// Exact amount in wei
    pub value_wei: U256,
    /// Amount in ether as a decimal string
    pub value_display: String,
    pub message: Option<String>,
    pub message_source: Option<MessageSource>,
    /// Importance score, at least 1.0
    pub message_weight: f64,
    pub block_number: u64,
    /// Unix timestamp in milliseconds when the donation was ingested
    pub timestamp: u64,
    /// Original call data, kept for audit when non-empty
    pub raw_data: Option<Bytes>,
}

impl Donation {
    /// Build a donation from a transaction and the message extracted from it
    pub fn new(
        tx: &ChainTransaction,
        recipient: Address,
        block_number: u64,
        extracted: Option<ExtractedMessage>,
        timestamp: u64,
    ) -> Self {
        let value_display = format_ether(tx.value);
        let (message, message_source) = match extracted {
            Some(m) => (Some(m.text), Some(m.source)),
            None => (None, None),
        };
        let message_weight = message_weight(&value_display, message.as_deref());

        Self {
            transaction_hash: tx.hash,
            from: tx.from,
            to: recipient,
            value_wei: tx.value,
            value_display,
            message,
            message_source,
            message_weight,
            block_number,
            timestamp,
            raw_data: (!tx.input.is_empty()).then(|| tx.input.clone()),
        }
    }

    /// The donation identifier (its transaction hash)
    pub fn id(&self) -> TxHash {
        self.transaction_hash
    }

    /// Whether a non-blank message is attached
    pub fn has_message(&self) -> bool {
        self.message
            .as_deref()
            .is_some_and(|m| !m.trim().is_empty())
    }

    /// First `max_chars` characters of the message, for log lines
    pub fn message_preview(&self, max_chars: usize) -> Option<String> {
        self.message
            .as_deref()
            .map(|m| m.chars().take(max_chars).collect())
    }
}

/// Get current timestamp in milliseconds
pub fn current_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
