use crate::errors::SourceError;
use crate::models::{ChannelRef, VideoPage, VideoRecord};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const PAGE_MAX_RESULTS: u32 = 50;

/// Seam between the extraction pipeline and the external video platform.
///
/// `fetch_video_page` returns the raw API payload so the caller can memoize
/// it; `parse_video_page` is the pure projection of that payload into
/// records.
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn list_subscribed_channels(&self) -> Result<Vec<ChannelRef>, SourceError>;

    async fn fetch_video_page(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
    ) -> Result<Value, SourceError>;

    fn parse_video_page(&self, channel: &ChannelRef, payload: &Value) -> VideoPage;
}

/// YouTube Data API v3 client. The access credential is acquired externally
/// and injected here as a ready bearer token.
pub struct YouTubeClient {
    http: Client,
    access_token: String,
}

impl YouTubeClient {
    pub fn new(access_token: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(YouTubeClient { http, access_token })
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, SourceError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SourceError::TransientNetwork(format!("malformed response body: {e}")))
    }
}

fn map_transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::TransientNetwork(format!("request timed out: {e}"))
    } else {
        SourceError::TransientNetwork(e.to_string())
    }
}

fn classify_status(status: u16, body: &str) -> SourceError {
    match status {
        401 => SourceError::Auth(format!("credential rejected (401): {body}")),
        403 if body.contains("quotaExceeded") || body.contains("rateLimitExceeded") => {
            SourceError::RateLimit(format!("quota exhausted (403): {body}"))
        }
        403 => SourceError::Auth(format!("access forbidden (403): {body}")),
        429 => SourceError::RateLimit(format!("too many requests (429): {body}")),
        _ => SourceError::TransientNetwork(format!("unexpected status {status}: {body}")),
    }
}

#[async_trait]
impl VideoSource for YouTubeClient {
    async fn list_subscribed_channels(&self) -> Result<Vec<ChannelRef>, SourceError> {
        // Documentation: https://developers.google.com/youtube/v3/docs/subscriptions
        let url = format!("{YOUTUBE_API_BASE}/subscriptions");
        let max_results = PAGE_MAX_RESULTS.to_string();

        let mut channels = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("part", "snippet"),
                ("mine", "true"),
                ("maxResults", max_results.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response = self.get_json(&url, &query).await?;

            if let Some(items) = response["items"].as_array() {
                for item in items {
                    let channel_id = item["snippet"]["resourceId"]["channelId"]
                        .as_str()
                        .unwrap_or_default();
                    if channel_id.is_empty() {
                        continue;
                    }
                    channels.push(ChannelRef {
                        channel_id: channel_id.to_string(),
                        title: item["snippet"]["title"].as_str().unwrap_or("").to_string(),
                    });
                }
            }

            page_token = response["nextPageToken"].as_str().map(String::from);
            if page_token.is_none() {
                break;
            }
        }

        info!("Found {} subscriptions", channels.len());
        Ok(channels)
    }

    async fn fetch_video_page(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
    ) -> Result<Value, SourceError> {
        // Documentation: https://developers.google.com/youtube/v3/docs/search
        let url = format!("{YOUTUBE_API_BASE}/search");
        let max_results = PAGE_MAX_RESULTS.to_string();

        let mut query = vec![
            ("part", "snippet"),
            ("channelId", channel_id),
            ("order", "date"),
            ("type", "video"),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = cursor {
            query.push(("pageToken", token));
        }

        self.get_json(&url, &query).await
    }

    fn parse_video_page(&self, channel: &ChannelRef, payload: &Value) -> VideoPage {
        parse_video_page(channel, payload)
    }
}

/// Projects one raw search payload into records, stamping the subscription's
/// channel identity and the extraction time onto every video.
pub fn parse_video_page(channel: &ChannelRef, payload: &Value) -> VideoPage {
    let fetched_at = Utc::now();
    let mut videos = Vec::new();

    if let Some(items) = payload["items"].as_array() {
        for item in items {
            let video_id = item["id"]["videoId"].as_str().unwrap_or_default();
            if video_id.is_empty() {
                continue;
            }

            let snippet = &item["snippet"];
            let published_at = snippet["publishedAt"]
                .as_str()
                .and_then(|s| s.parse::<DateTime<Utc>>().ok())
                .unwrap_or(DateTime::UNIX_EPOCH);

            videos.push(VideoRecord {
                video_id: video_id.to_string(),
                channel_id: channel.channel_id.clone(),
                channel_title: snippet["channelTitle"]
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .unwrap_or(&channel.title)
                    .to_string(),
                title: snippet["title"].as_str().unwrap_or("").to_string(),
                description: snippet["description"].as_str().unwrap_or("").to_string(),
                published_at,
                url: format!("https://www.youtube.com/watch?v={video_id}"),
                fetched_at,
            });
        }
    }

    VideoPage {
        videos,
        next_cursor: payload["nextPageToken"].as_str().map(String::from),
    }
}
