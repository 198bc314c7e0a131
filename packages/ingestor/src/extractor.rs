//! Message Extraction
//!
//! Pulls a human-readable message out of a donation's call data. Payloads that
//! start with a recognized tag are ABI-decoded as a single `string`; anything
//! else is read as raw UTF-8 text. Extraction never fails: a payload without a
//! usable message simply yields `None`.

use alloy::sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::filter::MessageTags;

/// Payloads shorter than this carry no message
pub const MIN_PAYLOAD_LEN: usize = 5;

/// Messages must be shorter than this many characters
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Where an extracted message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageSource {
    /// ABI-decoded from a tagged call
    Protocol,
    /// Read directly from the payload bytes
    Heuristic,
}

impl MessageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageSource::Protocol => "protocol",
            MessageSource::Heuristic => "heuristic",
        }
    }
}

/// A message recovered from a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMessage {
    pub text: String,
    pub source: MessageSource,
}

impl ExtractedMessage {
    fn protocol(text: String) -> Self {
        Self {
            text,
            source: MessageSource::Protocol,
        }
    }

    fn heuristic(text: String) -> Self {
        Self {
            text,
            source: MessageSource::Heuristic,
        }
    }
}

/// Extracts messages from transaction payloads
#[derive(Debug, Clone, Default)]
pub struct MessageExtractor {
    tags: MessageTags,
}

impl MessageExtractor {
    pub fn new(tags: MessageTags) -> Self {
        Self { tags }
    }

    pub fn tags(&self) -> &MessageTags {
        &self.tags
    }

    /// Extract a message from raw call data
    ///
    /// # Returns
    /// `Some(ExtractedMessage)` when the payload carries usable text, `None` otherwise
    pub fn extract(&self, payload: &[u8]) -> Option<ExtractedMessage> {
        if payload.len() < MIN_PAYLOAD_LEN {
            return None;
        }

        match self.tags.match_payload(payload) {
            Some(_) => {
                let body = &payload[4..];
                decode_abi_string(body)
                    .map(ExtractedMessage::protocol)
                    .or_else(|| read_text(body, true).map(ExtractedMessage::heuristic))
            }
            None => read_text(payload, false).map(ExtractedMessage::heuristic),
        }
    }
}

/// Decode `body` as an ABI-encoded `string` (offset word, length word, padded bytes).
///
/// Trailing bytes and non-zero padding are tolerated; only the offset and length
/// words decide what is read.
pub fn decode_abi_string(body: &[u8]) -> Option<String> {
    let decoded = String::abi_decode(body, false).ok()?;
    accept(sanitize(&decoded))
}

/// Read `bytes` as UTF-8 text, replacing invalid sequences.
///
/// With `printable_only`, the text must consist of printable ASCII and whitespace.
pub fn read_text(bytes: &[u8], printable_only: bool) -> Option<String> {
    let text = sanitize(&String::from_utf8_lossy(bytes));
    if printable_only && !is_printable_ascii(&text) {
        return None;
    }
    accept(text)
}

/// Strip NUL characters and surrounding whitespace
pub fn sanitize(text: &str) -> String {
    text.replace('\0', "").trim().to_string()
}

fn accept(text: String) -> Option<String> {
    let chars = text.chars().count();
    (chars > 0 && chars < MAX_MESSAGE_CHARS).then_some(text)
}

fn is_printable_ascii(text: &str) -> bool {
    text.chars()
        .all(|c| (' '..='~').contains(&c) || c.is_ascii_whitespace())
}
