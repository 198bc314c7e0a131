//! Donation ingestor service
//!
//! Scans the configured chain on a fixed interval and publishes new donations
//! to Redis when `REDIS_URL` is set.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use donation_ingestor::chain;
use donation_ingestor::{DonationPublisher, Ingestor, IngestorConfig, MessageExtractor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = IngestorConfig::from_env().context("Failed to load configuration")?;
    let address = config
        .donation_address
        .context("DONATION_ADDRESS is not set")?;

    let reader = chain::connect(config.reader_config())
        .await
        .context("Failed to connect to chain endpoint")?;
    info!(
        "Chain requests time out after {}ms with {} retries",
        reader.config().timeout_ms,
        reader.config().max_retries
    );

    let extractor = MessageExtractor::new(config.message_tags.clone());
    if extractor.tags().is_empty() {
        info!("No message tags configured, all payloads read as plain text");
    } else {
        info!("Message tags: {}", extractor.tags().describe().join(", "));
    }

    let ingestor = Ingestor::new(reader, &address, extractor).with_lookback(config.lookback_blocks);

    let mut publisher = match config.redis_url.as_deref() {
        Some(url) => match DonationPublisher::connect(url, config.channel.clone()).await {
            Ok(publisher) => {
                info!("Publishing donations to Redis channel '{}'", publisher.channel());
                Some(publisher)
            }
            Err(e) => {
                warn!("Redis unavailable, donations will not be published: {}", e);
                None
            }
        },
        None => None,
    };

    info!(
        "Monitoring donations to {:#x} every {}s",
        address, config.scan_interval_secs
    );

    donation_ingestor::service::run_until(
        &ingestor,
        publisher.as_mut(),
        config.scan_interval(),
        shutdown_signal(),
    )
    .await;

    Ok(())
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
