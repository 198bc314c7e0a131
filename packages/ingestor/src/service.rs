//! Periodic scan loop
//!
//! Runs a scan cycle on every tick of a fixed interval and forwards new
//! donations to the publisher, until the shutdown future resolves. Shutdown is
//! honored while a scan is in flight; the interrupted cycle is dropped without
//! advancing the cursor.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::chain::ChainReader;
use crate::ingestor::Ingestor;
use crate::publisher::DonationPublisher;

/// Scan every `period` (first scan immediately) until `shutdown` resolves
pub async fn run_until<R, F>(
    ingestor: &Ingestor<R>,
    mut publisher: Option<&mut DonationPublisher>,
    period: Duration,
    shutdown: F,
) where
    R: ChainReader,
    F: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = tokio::select! {
                    report = ingestor.run_scan_cycle() => report,
                    _ = &mut shutdown => {
                        info!("Shutting down, abandoning scan in progress");
                        return;
                    }
                };
                if let Some(publisher) = publisher.as_deref_mut() {
                    for donation in &report.new_donations {
                        if let Err(e) = publisher.publish(donation).await {
                            warn!("Failed to publish donation {:#x}: {}", donation.id(), e);
                        }
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                return;
            }
        }
    }
}
