use chrono::{DateTime, Utc};
use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::Responder;
use rocket::serde::{Deserialize, Serialize};
use rocket::{response, Response};
use std::io::Cursor;

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminToken(pub String);

/// A channel the authenticated user is subscribed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRef {
    pub channel_id: String,
    pub title: String,
}

/// One extracted video, as persisted in the ledger file and the index.
///
/// Field names follow the on-disk/index document format, hence the
/// camelCase rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub video_id: String,
    pub channel_id: String,
    pub channel_title: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
}

/// One page of a channel listing as returned by the platform API.
#[derive(Debug, Clone)]
pub struct VideoPage {
    pub videos: Vec<VideoRecord>,
    pub next_cursor: Option<String>,
}

/// Projection of a VideoRecord returned to search callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    #[serde(rename = "channelTitle")]
    pub channel_title: String,
    pub description: String,
}

impl From<&VideoRecord> for SearchHit {
    fn from(record: &VideoRecord) -> Self {
        SearchHit {
            url: record.url.clone(),
            title: record.title.clone(),
            channel_title: record.channel_title.clone(),
            description: record.description.clone(),
        }
    }
}

/// One page of search results plus pagination metadata.
///
/// `total_pages` is ceil(total matches / page size); zero means no matches
/// and signals the caller that there are no further pages.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultPage {
    pub results: Vec<SearchHit>,
    pub page: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelFailure {
    pub channel_id: String,
    pub channel_title: String,
    pub error: String,
}

/// Outcome of one extraction run across all subscribed channels.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub channels_total: usize,
    pub videos_upserted: usize,
    pub failures: Vec<ChannelFailure>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip)]
    pub status: Status,
}

impl ErrorResponse {
    pub fn new(status: Status, error: &str, message: String) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message,
            status,
        }
    }
}

impl<'r> Responder<'r, 'static> for ErrorResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let json = serde_json::to_string(&self).unwrap();
        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> VideoRecord {
        VideoRecord {
            video_id: "abc123".into(),
            channel_id: "UC1".into(),
            channel_title: "Channel One".into(),
            title: "A title".into(),
            description: "words".into(),
            published_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            url: "https://www.youtube.com/watch?v=abc123".into(),
            fetched_at: Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn video_record_uses_document_field_names() {
        let value = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(value["videoId"], "abc123");
        assert_eq!(value["channelId"], "UC1");
        assert_eq!(value["channelTitle"], "Channel One");
        assert_eq!(value["publishedAt"], "2024-03-01T12:00:00Z");
        assert!(value.get("video_id").is_none());
    }

    #[test]
    fn search_hit_projects_display_fields() {
        let hit = SearchHit::from(&sample_record());
        assert_eq!(hit.title, "A title");
        let value = serde_json::to_value(&hit).unwrap();
        assert_eq!(value["channelTitle"], "Channel One");
    }
}
