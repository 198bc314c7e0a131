//! Donation Filtering
//!
//! Decides which chain transactions count as donations and which 4-byte
//! selectors mark a payload as carrying a protocol-encoded message.

use std::collections::HashSet;

use alloy::primitives::{Address, U256};
use thiserror::Error;

use crate::chain::ChainTransaction;

/// Selectors recognized as message-bearing calls when no tag list is configured.
///
/// These are placeholders carried over from the upstream deployment, not a
/// standardized registry; deployments are expected to override them.
pub const DEFAULT_MESSAGE_TAGS: &[([u8; 4], &str)] = &[
    ([0x9d, 0x96, 0xe2, 0xdf], "sendMessage(string)"),
    ([0x8b, 0xe0, 0x07, 0x9c], "message(string)"),
];

/// Errors that can occur while parsing a tag list
#[derive(Error, Debug, PartialEq)]
pub enum TagParseError {
    #[error("Invalid hex in selector '{0}'")]
    InvalidHex(String),

    #[error("Selector '{0}' must be exactly 4 bytes")]
    InvalidLength(String),
}

/// Set of 4-byte selectors that mark a payload as protocol-encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTags {
    selectors: HashSet<[u8; 4]>,
}

impl Default for MessageTags {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_TAGS.iter().map(|(selector, _)| *selector))
    }
}

impl MessageTags {
    /// Create a tag set from the given selectors
    pub fn new(selectors: impl IntoIterator<Item = [u8; 4]>) -> Self {
        Self {
            selectors: selectors.into_iter().collect(),
        }
    }

    /// A tag set that recognizes nothing, so every payload goes down the heuristic path
    pub fn empty() -> Self {
        Self {
            selectors: HashSet::new(),
        }
    }

    /// Parse a comma-separated list of hex selectors, e.g. `0x9d96e2df,8be0079c`.
    ///
    /// Blank entries are ignored.
    pub fn parse_list(list: &str) -> Result<Self, TagParseError> {
        let mut selectors = HashSet::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let bytes =
                hex_to_bytes(entry).map_err(|_| TagParseError::InvalidHex(entry.to_string()))?;
            let selector: [u8; 4] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| TagParseError::InvalidLength(entry.to_string()))?;
            selectors.insert(selector);
        }
        Ok(Self { selectors })
    }

    /// Check whether a selector is a recognized message tag
    pub fn contains(&self, selector: &[u8; 4]) -> bool {
        self.selectors.contains(selector)
    }

    /// Return the recognized tag at the start of `payload`, if any
    pub fn match_payload(&self, payload: &[u8]) -> Option<[u8; 4]> {
        extract_selector(payload).filter(|selector| self.contains(selector))
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Sorted hex selectors, with the call signature for known defaults
    pub fn describe(&self) -> Vec<String> {
        let mut selectors: Vec<&[u8; 4]> = self.selectors.iter().collect();
        selectors.sort();
        selectors
            .into_iter()
            .map(|selector| match tag_name(selector) {
                Some(name) => format!("{} ({})", selector_hex(selector), name),
                None => selector_hex(selector),
            })
            .collect()
    }
}

/// Call signature of a default message tag
pub fn tag_name(selector: &[u8; 4]) -> Option<&'static str> {
    DEFAULT_MESSAGE_TAGS
        .iter()
        .find(|(known, _)| known == selector)
        .map(|(_, name)| *name)
}

/// Extract the 4-byte selector from a transaction payload
///
/// # Returns
/// `Some([u8; 4])` if the payload has at least 4 bytes, `None` otherwise
pub fn extract_selector(input: &[u8]) -> Option<[u8; 4]> {
    if input.len() < 4 {
        return None;
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&input[..4]);
    Some(selector)
}

/// Format a selector as a hex string with 0x prefix
pub fn selector_hex(selector: &[u8; 4]) -> String {
    format!("0x{}", hex::encode(selector))
}

/// Parse a hex string to bytes (with or without 0x prefix)
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_str)
}

/// Check whether a transaction is a value transfer to `recipient`.
///
/// Addresses compare as raw bytes, so checksum casing in the source data
/// has no effect.
pub fn is_donation_to(tx: &ChainTransaction, recipient: Address) -> bool {
    tx.to == Some(recipient) && tx.value > U256::ZERO
}
