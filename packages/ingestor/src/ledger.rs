//! Donation Ledger
//!
//! Process-lifetime store of recorded donations, keyed by transaction hash,
//! together with the scan cursor. Records are inserted at most once and never
//! modified or removed.

use std::collections::HashMap;

use alloy::primitives::TxHash;
use tokio::sync::RwLock;

use crate::donation::Donation;

/// Outcome of [`Ledger::upsert_if_absent`]
#[derive(Debug, Clone, PartialEq)]
pub enum Upserted {
    /// The builder ran and its donation was stored
    Inserted(Donation),
    /// A donation with this hash was already recorded; the builder did not run
    Existing(Donation),
}

impl Upserted {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Upserted::Inserted(_))
    }

    pub fn donation(&self) -> &Donation {
        match self {
            Upserted::Inserted(d) | Upserted::Existing(d) => d,
        }
    }

    pub fn into_donation(self) -> Donation {
        match self {
            Upserted::Inserted(d) | Upserted::Existing(d) => d,
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    donations: HashMap<TxHash, Donation>,
    /// Hashes in insertion order, used to break timestamp ties
    order: Vec<TxHash>,
    cursor: Option<u64>,
}

/// In-memory donation store
#[derive(Debug, Default)]
pub struct Ledger {
    state: RwLock<LedgerState>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the donation recorded under `hash`, or build and record one.
    ///
    /// `build` runs only when `hash` is unknown, and runs under the write lock,
    /// so concurrent callers for the same hash cannot both insert.
    ///
    /// # Panics
    /// If the built donation's hash differs from `hash`.
    pub async fn upsert_if_absent<F>(&self, hash: TxHash, build: F) -> Upserted
    where
        F: FnOnce() -> Donation,
    {
        let mut state = self.state.write().await;
        if let Some(existing) = state.donations.get(&hash) {
            return Upserted::Existing(existing.clone());
        }

        let donation = build();
        assert_eq!(
            donation.transaction_hash, hash,
            "donation built for {} carries hash {}",
            hash, donation.transaction_hash
        );

        state.order.push(hash);
        state.donations.insert(hash, donation.clone());
        Upserted::Inserted(donation)
    }

    pub async fn get(&self, hash: &TxHash) -> Option<Donation> {
        self.state.read().await.donations.get(hash).cloned()
    }

    pub async fn contains(&self, hash: &TxHash) -> bool {
        self.state.read().await.donations.contains_key(hash)
    }

    /// All donations, most recent first
    pub async fn list_all(&self) -> Vec<Donation> {
        let state = self.state.read().await;
        let mut donations: Vec<Donation> = state
            .order
            .iter()
            .rev()
            .filter_map(|hash| state.donations.get(hash).cloned())
            .collect();
        // Stable sort keeps later insertions ahead of earlier ones on equal timestamps
        donations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        donations
    }

    /// Donations carrying a non-blank message, most recent first
    pub async fn list_with_messages(&self) -> Vec<Donation> {
        self.list_all()
            .await
            .into_iter()
            .filter(Donation::has_message)
            .collect()
    }

    /// Highest block fully scanned, `None` before the first completed scan
    pub async fn cursor(&self) -> Option<u64> {
        self.state.read().await.cursor
    }

    /// Move the scan cursor to `height`.
    ///
    /// # Panics
    /// If `height` is below the current cursor.
    pub async fn advance_cursor(&self, height: u64) {
        let mut state = self.state.write().await;
        if let Some(current) = state.cursor {
            assert!(
                height >= current,
                "scan cursor moved backwards: {} -> {}",
                current,
                height
            );
        }
        state.cursor = Some(height);
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.donations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.donations.is_empty()
    }
}
