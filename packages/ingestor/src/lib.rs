//! Donation Ingestor Library
//!
//! This crate scans an EVM chain for payments to a monitored address, extracts
//! any message attached to each payment, scores it, and records it in an
//! in-memory ledger. New donations can be forwarded to Redis.

pub mod chain;
pub mod config;
pub mod donation;
pub mod extractor;
pub mod filter;
pub mod ingestor;
pub mod ledger;
pub mod publisher;
pub mod service;
pub mod weight;

// Re-export commonly used types
pub use chain::{ChainError, ChainReader, RpcChainReader};
pub use config::IngestorConfig;
pub use donation::Donation;
pub use extractor::{ExtractedMessage, MessageExtractor, MessageSource};
pub use ingestor::{Ingestor, ScanReport, ScanStatus, WalletProvider};
pub use ledger::Ledger;
pub use publisher::{DonationMessage, DonationPublisher};
