//! Ingestion Orchestrator
//!
//! Drives incremental scans: works out which blocks are new since the last
//! cycle, pulls them from the chain, records every value transfer to the
//! monitored address, and advances the cursor. A cycle is best effort; a block
//! that fails to load is logged and skipped, and is not revisited once the
//! cursor has moved past it.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::{Address, TxHash};
use tracing::{debug, error, info, warn};

use crate::chain::{ChainBlock, ChainError, ChainReader, ChainTransaction};
use crate::donation::{current_timestamp_millis, Donation};
use crate::extractor::MessageExtractor;
use crate::filter::is_donation_to;
use crate::ledger::{Ledger, Upserted};

/// Blocks behind the chain head to scan when no cursor exists yet
pub const LOOKBACK_BLOCKS: u64 = 10;

/// Characters of a message to include in log lines
const LOG_PREVIEW_CHARS: usize = 50;

/// Supplies the address whose incoming payments are donations
pub trait WalletProvider {
    fn monitored_address(&self) -> Address;
}

impl WalletProvider for Address {
    fn monitored_address(&self) -> Address {
        *self
    }
}

/// How a scan cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// The range was scanned and the cursor advanced
    Completed,
    /// No blocks beyond the cursor
    UpToDate,
    /// Another cycle was in progress; nothing was done
    AlreadyRunning,
    /// The chain height could not be read; the cursor is unchanged
    Failed,
}

/// Result of one scan cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub status: ScanStatus,
    /// Blocks examined this cycle
    pub range: Option<RangeInclusive<u64>>,
    /// Donations first recorded during this cycle, in block order
    pub new_donations: Vec<Donation>,
    pub count: usize,
    /// Blocks that could not be fetched and were skipped
    pub failed_blocks: Vec<u64>,
}

impl ScanReport {
    fn idle(status: ScanStatus) -> Self {
        Self {
            status,
            range: None,
            new_donations: Vec::new(),
            count: 0,
            failed_blocks: Vec::new(),
        }
    }
}

/// Compute the blocks to scan given the cursor and the chain head.
///
/// Resumes after the cursor when one exists; otherwise starts `lookback`
/// blocks behind the head. Returns `None` when there is nothing new.
pub fn scan_range(cursor: Option<u64>, current_height: u64, lookback: u64) -> Option<RangeInclusive<u64>> {
    let start = match cursor {
        Some(cursor) => cursor.checked_add(1)?,
        None => current_height.saturating_sub(lookback),
    };
    (start <= current_height).then_some(start..=current_height)
}

/// Holds the scanning flag for the duration of a cycle
struct ScanGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Scans the chain for donations and records them in its ledger
pub struct Ingestor<R> {
    reader: R,
    ledger: Ledger,
    extractor: MessageExtractor,
    monitored: Address,
    lookback: u64,
    scanning: AtomicBool,
}

impl<R: ChainReader> Ingestor<R> {
    /// Create an ingestor watching the wallet's address, with an empty ledger
    pub fn new(reader: R, wallet: &impl WalletProvider, extractor: MessageExtractor) -> Self {
        Self {
            reader,
            ledger: Ledger::new(),
            extractor,
            monitored: wallet.monitored_address(),
            lookback: LOOKBACK_BLOCKS,
            scanning: AtomicBool::new(false),
        }
    }

    /// Override the bootstrap lookback window
    pub fn with_lookback(mut self, lookback: u64) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn monitored_address(&self) -> Address {
        self.monitored
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Whether a scan cycle is currently running
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Run one scan cycle.
    ///
    /// Safe to call from a timer and on demand at the same time: a call made
    /// while another cycle is running returns immediately with
    /// [`ScanStatus::AlreadyRunning`].
    pub async fn run_scan_cycle(&self) -> ScanReport {
        let Some(_guard) = ScanGuard::acquire(&self.scanning) else {
            debug!("Scan already in progress, skipping");
            return ScanReport::idle(ScanStatus::AlreadyRunning);
        };

        let current_height = match self.reader.current_height().await {
            Ok(height) => height,
            Err(e) => {
                error!("Failed to read chain height: {}", e);
                return ScanReport::idle(ScanStatus::Failed);
            }
        };

        let cursor = self.ledger.cursor().await;
        let Some(range) = scan_range(cursor, current_height, self.lookback) else {
            debug!("No new blocks (cursor {:?}, head {})", cursor, current_height);
            return ScanReport::idle(ScanStatus::UpToDate);
        };

        debug!("Checking blocks {} to {} for donations", range.start(), range.end());

        let mut new_donations = Vec::new();
        let mut failed_blocks = Vec::new();
        for height in range.clone() {
            match self.reader.block_with_transactions(height).await {
                Ok(block) => new_donations.extend(self.process_block(&block).await),
                Err(e) => {
                    log_block_failure(height, &e);
                    failed_blocks.push(height);
                }
            }
        }

        self.ledger.advance_cursor(*range.end()).await;

        if !new_donations.is_empty() {
            info!("Found {} new donation(s)", new_donations.len());
        }
        if !failed_blocks.is_empty() {
            warn!("Skipped {} block(s) this cycle: {:?}", failed_blocks.len(), failed_blocks);
        }

        ScanReport {
            status: ScanStatus::Completed,
            range: Some(range),
            count: new_donations.len(),
            new_donations,
            failed_blocks,
        }
    }

    /// Record every donation in `block`, returning those not seen before
    async fn process_block(&self, block: &ChainBlock) -> Vec<Donation> {
        let mut created = Vec::new();
        for tx in block
            .transactions
            .iter()
            .filter(|tx| is_donation_to(tx, self.monitored))
        {
            let result = self
                .ledger
                .upsert_if_absent(tx.hash, || self.build_donation(tx, block.number))
                .await;
            if let Upserted::Inserted(donation) = result {
                log_new_donation(&donation);
                created.push(donation);
            }
        }
        created
    }

    fn build_donation(&self, tx: &ChainTransaction, block_number: u64) -> Donation {
        let extracted = self.extractor.extract(&tx.input);
        Donation::new(
            tx,
            self.monitored,
            block_number,
            extracted,
            current_timestamp_millis(),
        )
    }

    /// Ingest a single transaction by hash, outside the block scan.
    ///
    /// Returns `Ok(None)` when the transaction is not addressed to the monitored
    /// address or was reverted. Zero-value transfers are accepted on this path.
    pub async fn ingest_transaction(&self, hash: TxHash) -> Result<Option<Donation>, ChainError> {
        let tx = self.reader.transaction(hash).await?;
        if tx.to != Some(self.monitored) {
            return Ok(None);
        }

        if let Some(existing) = self.ledger.get(&hash).await {
            return Ok(Some(existing));
        }

        let receipt = self.reader.receipt(hash).await?;
        if receipt.success == Some(false) {
            warn!("Transaction {:#x} reverted, not recording", hash);
            return Ok(None);
        }
        let block_number = receipt.block_number.ok_or_else(|| {
            ChainError::Protocol(format!("Receipt for {:#x} has no block number", hash))
        })?;

        let result = self
            .ledger
            .upsert_if_absent(hash, || self.build_donation(&tx, block_number))
            .await;
        if result.is_inserted() {
            log_new_donation(result.donation());
        }
        Ok(Some(result.into_donation()))
    }

    /// All recorded donations, most recent first
    pub async fn list_all(&self) -> Vec<Donation> {
        self.ledger.list_all().await
    }

    /// Recorded donations with a message, most recent first
    pub async fn list_with_messages(&self) -> Vec<Donation> {
        self.ledger.list_with_messages().await
    }

    pub async fn get_by_hash(&self, hash: &TxHash) -> Option<Donation> {
        self.ledger.get(hash).await
    }
}

fn log_block_failure(height: u64, err: &ChainError) {
    if err.is_transient() {
        warn!("Failed to check block {}: {}", height, err);
    } else {
        error!("Failed to check block {}: {}", height, err);
    }
}

fn log_new_donation(donation: &Donation) {
    match donation.message_preview(LOG_PREVIEW_CHARS) {
        Some(preview) => info!(
            "New donation received: {} ETH from {:#x} with message: \"{}\"",
            donation.value_display, donation.from, preview
        ),
        None => info!(
            "New donation received: {} ETH from {:#x}",
            donation.value_display, donation.from
        ),
    }
}
