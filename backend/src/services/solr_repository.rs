use crate::errors::StorageError;
use crate::models::{ResultPage, SearchHit, VideoRecord};
use crate::services::storage::{total_pages, validate_query_text};
use chrono::SecondsFormat;
use log::{debug, info};
use reqwest::Client;
use serde_json::{json, Value};

/// Fields returned to search callers.
const RESULT_FIELDS: &str = "url,title,channelTitle,description";
/// Fields the full-text query runs over.
const QUERY_FIELDS: &str = "title description";

/// Repository over a Solr core. Documents are keyed by videoId, so a
/// re-submitted id replaces the previous document (uniqueKey upsert).
pub struct IndexRepository {
    http: Client,
    solr_url: String,
}

impl IndexRepository {
    pub fn new(solr_url: String) -> Self {
        IndexRepository {
            http: Client::new(),
            solr_url: solr_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn upsert(&self, records: &[VideoRecord]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        let documents: Vec<Value> = records.iter().map(to_document).collect();
        let url = format!("{}/update", self.solr_url);

        let response = self
            .http
            .post(&url)
            .query(&[("commit", "true")])
            .json(&documents)
            .send()
            .await
            .map_err(|e| StorageError::BackendUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::BackendUnavailable(format!(
                "index update failed with status {status}: {body}"
            )));
        }

        info!("Indexed {} documents into Solr", documents.len());
        Ok(records.len())
    }

    pub async fn query(
        &self,
        text: &str,
        page: usize,
        page_size: usize,
    ) -> Result<ResultPage, StorageError> {
        validate_query_text(text)?;
        let page = page.max(1);

        let start = ((page - 1) * page_size).to_string();
        let rows = page_size.to_string();
        let url = format!("{}/select", self.solr_url);
        let params = [
            ("q", text),
            ("defType", "edismax"),
            ("qf", QUERY_FIELDS),
            ("fl", RESULT_FIELDS),
            ("start", start.as_str()),
            ("rows", rows.as_str()),
            ("wt", "json"),
        ];

        debug!("Solr select: q={text:?} start={start} rows={page_size}");

        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| StorageError::BackendUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::BackendUnavailable(format!(
                "index query failed with status {status}: {body}"
            )));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| StorageError::BackendUnavailable(format!("malformed Solr response: {e}")))?;

        Ok(parse_select_response(&body, page, page_size))
    }
}

fn to_document(record: &VideoRecord) -> Value {
    json!({
        "id": record.video_id,
        "videoId": record.video_id,
        "channelId": record.channel_id,
        "channelTitle": record.channel_title,
        "title": record.title,
        "description": record.description,
        "publishedAt": record.published_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        "url": record.url,
        "fetchedAt": record.fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

/// Stored fields come back as plain strings, or as single-element arrays
/// when the schema marks them multiValued.
fn doc_str(doc: &Value, field: &str) -> String {
    match &doc[field] {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .first()
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn parse_select_response(body: &Value, page: usize, page_size: usize) -> ResultPage {
    let total_matches = body["response"]["numFound"].as_u64().unwrap_or(0) as usize;

    let results = body["response"]["docs"]
        .as_array()
        .map(|docs| {
            docs.iter()
                .map(|doc| SearchHit {
                    url: doc_str(doc, "url"),
                    title: doc_str(doc, "title"),
                    channel_title: doc_str(doc, "channelTitle"),
                    description: doc_str(doc, "description"),
                })
                .collect()
        })
        .unwrap_or_default();

    ResultPage {
        results,
        page,
        total_pages: total_pages(total_matches, page_size),
    }
}
