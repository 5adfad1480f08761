use crate::errors::{SourceError, StorageError};
use crate::models::{ChannelFailure, ChannelRef, ExtractionReport, VideoRecord};
use crate::services::extraction_cache::{CacheKey, ExtractionCache};
use crate::services::source_client::VideoSource;
use crate::services::storage::StorageRepository;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const FETCH_MAX_ATTEMPTS: u32 = 3;
const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(500);
const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
enum ChannelError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Runs one extraction pass over every subscribed channel.
///
/// Channels are processed with bounded concurrency; a failing channel is
/// logged and reported without aborting the run, except for an auth
/// failure, which no channel can recover from. Records are upserted in one
/// batch per channel.
pub async fn run_extraction(
    source: Arc<dyn VideoSource>,
    cache: Arc<ExtractionCache>,
    repository: Arc<StorageRepository>,
    concurrency: usize,
) -> Result<ExtractionReport, SourceError> {
    info!("Starting subscription extraction run...");

    let channels = source.list_subscribed_channels().await?;
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let mut report = ExtractionReport {
        channels_total: channels.len(),
        ..Default::default()
    };

    let mut tasks = JoinSet::new();
    for channel in channels {
        let source = source.clone();
        let cache = cache.clone();
        let repository = repository.clone();
        let semaphore = semaphore.clone();

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("extraction semaphore closed");
            let result = process_channel(&*source, &cache, &repository, &channel).await;
            (channel, result)
        });
    }

    let mut fatal: Option<SourceError> = None;
    while let Some(joined) = tasks.join_next().await {
        let (channel, result) = joined.expect("extraction task panicked");
        match result {
            Ok(count) => {
                info!(
                    "Extracted {count} videos for channel: {} ({})",
                    channel.title, channel.channel_id
                );
                report.videos_upserted += count;
            }
            Err(ChannelError::Source(e @ SourceError::Auth(_))) => {
                error!("Credential failure, aborting run: {e}");
                fatal = Some(e);
            }
            Err(e) => {
                error!(
                    "Extraction failed for channel {} ({}): {e}",
                    channel.title, channel.channel_id
                );
                report.failures.push(ChannelFailure {
                    channel_id: channel.channel_id,
                    channel_title: channel.title,
                    error: e.to_string(),
                });
            }
        }
    }

    if let Some(e) = fatal {
        return Err(e);
    }

    info!(
        "Extraction run completed: {} channels, {} videos upserted, {} failed",
        report.channels_total,
        report.videos_upserted,
        report.failures.len()
    );
    Ok(report)
}

async fn process_channel(
    source: &dyn VideoSource,
    cache: &ExtractionCache,
    repository: &StorageRepository,
    channel: &ChannelRef,
) -> Result<usize, ChannelError> {
    let records = collect_channel_videos(source, cache, channel).await?;
    if records.is_empty() {
        info!("No videos found for channel: {}", channel.title);
        return Ok(0);
    }

    Ok(repository.upsert(&records).await?)
}

/// Pages through a channel's listing via the cache until the platform
/// reports no further cursor, accumulating one batch of records.
async fn collect_channel_videos(
    source: &dyn VideoSource,
    cache: &ExtractionCache,
    channel: &ChannelRef,
) -> Result<Vec<VideoRecord>, SourceError> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let payload =
            fetch_page_with_retry(source, cache, &channel.channel_id, cursor.as_deref()).await?;
        let page = source.parse_video_page(channel, &payload);
        records.extend(page.videos);

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(records)
}

async fn fetch_page_with_retry(
    source: &dyn VideoSource,
    cache: &ExtractionCache,
    channel_id: &str,
    cursor: Option<&str>,
) -> Result<serde_json::Value, SourceError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let key = CacheKey::new(channel_id, cursor);
        let result = cache
            .get_or_fetch(key, || source.fetch_video_page(channel_id, cursor))
            .await;

        match result {
            Ok(payload) => return Ok(payload),
            Err(e) if e.is_retryable() && attempt < FETCH_MAX_ATTEMPTS => {
                let delay = match &e {
                    SourceError::RateLimit(_) => RATE_LIMIT_RETRY_DELAY,
                    _ => TRANSIENT_RETRY_DELAY * attempt,
                };
                warn!(
                    "Fetch attempt {attempt} failed for channel {channel_id} \
                     (cursor {cursor:?}), retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
