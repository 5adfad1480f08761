use crate::errors::SourceError;
use log::{debug, info};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Call signature of one external API invocation: the channel id plus the
/// API-side page cursor (`None` for the first page of a listing).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub channel_id: String,
    pub cursor: Option<String>,
}

impl CacheKey {
    pub fn new(channel_id: &str, cursor: Option<&str>) -> Self {
        CacheKey {
            channel_id: channel_id.to_string(),
            cursor: cursor.map(String::from),
        }
    }
}

struct CacheEntry {
    payload: Value,
    created_at: Instant,
}

type Slot = Arc<tokio::sync::Mutex<Option<CacheEntry>>>;

/// Memoizes raw platform API payloads per call signature.
///
/// Entries are never proactively evicted, only overwritten once stale; call
/// volume is bounded by subscription and video counts, so no size bound is
/// needed. The per-key async mutex makes check-then-fetch-then-store atomic:
/// concurrent callers of a missing or expired key collapse into a single
/// fetch and all observe the stored value.
pub struct ExtractionCache {
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl ExtractionCache {
    pub fn new(ttl: Duration) -> Self {
        ExtractionCache {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached payload for `key` if it is younger than the ttl,
    /// otherwise invokes `fetch`, stores its result and returns it. A failed
    /// fetch stores nothing, so the next caller tries again.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Value, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, SourceError>>,
    {
        let slot = {
            let mut slots = self.slots.lock().expect("cache slot map lock poisoned");
            slots.entry(key.clone()).or_default().clone()
        };

        let mut entry = slot.lock().await;

        if let Some(existing) = entry.as_ref() {
            if existing.created_at.elapsed() < self.ttl {
                debug!("Using cached data for {key:?}");
                return Ok(existing.payload.clone());
            }
            info!("Cache expired for {key:?}, fetching new data");
        }

        let payload = fetch().await?;
        *entry = Some(CacheEntry {
            payload: payload.clone(),
            created_at: Instant::now(),
        });

        Ok(payload)
    }
}
