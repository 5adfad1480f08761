use crate::errors::StorageError;
use crate::models::{ResultPage, SearchHit, VideoRecord};
use crate::services::storage::{total_pages, validate_query_text};
use log::info;
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

/// Repository over a single JSON file holding every extracted record,
/// deduplicated by videoId.
///
/// Writes are whole-file: the new sequence is serialized to a temporary
/// file in the same directory and atomically renamed over the ledger, so a
/// concurrent reader sees either the old or the new content, never a torn
/// write.
pub struct LedgerRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LedgerRepository {
    pub fn new(path: PathBuf) -> Self {
        LedgerRepository {
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Vec<VideoRecord>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let bytes = std::fs::read(&self.path).map_err(|e| {
            StorageError::BackendUnavailable(format!(
                "cannot read ledger {}: {e}",
                self.path.display()
            ))
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::BackendUnavailable(format!(
                "ledger {} is not valid JSON: {e}",
                self.path.display()
            ))
        })
    }

    fn store(&self, records: &[VideoRecord]) -> Result<(), StorageError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let tmp = NamedTempFile::new_in(&dir).map_err(|e| {
            StorageError::BackendUnavailable(format!("cannot create ledger temp file: {e}"))
        })?;

        serde_json::to_writer_pretty(tmp.as_file(), records).map_err(|e| {
            StorageError::BackendUnavailable(format!("cannot serialize ledger: {e}"))
        })?;

        tmp.persist(&self.path).map_err(|e| {
            StorageError::BackendUnavailable(format!(
                "cannot replace ledger {}: {e}",
                self.path.display()
            ))
        })?;

        Ok(())
    }

    /// Inserts or overwrites each incoming record by videoId, preserving the
    /// first-seen order of surviving records, and rewrites the whole file.
    pub async fn upsert(&self, records: &[VideoRecord]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;

        let mut existing = self.load()?;
        let mut index: HashMap<String, usize> = existing
            .iter()
            .enumerate()
            .map(|(i, r)| (r.video_id.clone(), i))
            .collect();

        for record in records {
            match index.get(&record.video_id) {
                Some(&i) => existing[i] = record.clone(),
                None => {
                    index.insert(record.video_id.clone(), existing.len());
                    existing.push(record.clone());
                }
            }
        }

        self.store(&existing)?;
        info!(
            "Ledger {} now holds {} records",
            self.path.display(),
            existing.len()
        );

        Ok(records.len())
    }

    /// Case-insensitive token scoring over title and description: the score
    /// of a record is the number of query tokens found in either field;
    /// zero-score records are dropped, the rest sort by score then by most
    /// recent publishedAt.
    pub async fn query(
        &self,
        text: &str,
        page: usize,
        page_size: usize,
    ) -> Result<ResultPage, StorageError> {
        validate_query_text(text)?;
        let page = page.max(1);

        let tokens: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
        let records = self.load()?;

        let mut scored: Vec<(usize, &VideoRecord)> = records
            .iter()
            .filter_map(|record| {
                let score = score_record(record, &tokens);
                (score > 0).then_some((score, record))
            })
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .cmp(score_a)
                .then_with(|| b.published_at.cmp(&a.published_at))
        });

        let total_matches = scored.len();
        let results: Vec<SearchHit> = scored
            .iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .map(|(_, record)| SearchHit::from(*record))
            .collect();

        Ok(ResultPage {
            results,
            page,
            total_pages: total_pages(total_matches, page_size),
        })
    }
}

fn score_record(record: &VideoRecord, tokens: &[String]) -> usize {
    let title = record.title.to_lowercase();
    let description = record.description.to_lowercase();

    tokens
        .iter()
        .filter(|token| title.contains(token.as_str()) || description.contains(token.as_str()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn repo(dir: &tempfile::TempDir) -> LedgerRepository {
        LedgerRepository::new(dir.path().join("videos.json"))
    }

    fn record(id: &str, title: &str, description: &str, days_ago: i64) -> VideoRecord {
        VideoRecord {
            video_id: id.into(),
            channel_id: "UC1".into(),
            channel_title: "Channel".into(),
            title: title.into(),
            description: description.into(),
            published_at: Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
                - ChronoDuration::days(days_ago),
            url: format!("https://www.youtube.com/watch?v={id}"),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let dir = tempdir().unwrap();
        let ledger = repo(&dir);
        let batch = vec![
            record("a", "alpha news", "", 1),
            record("b", "beta news", "", 2),
        ];

        assert_eq!(ledger.upsert(&batch).await.unwrap(), 2);
        assert_eq!(ledger.upsert(&batch).await.unwrap(), 2);

        let persisted = ledger.load().unwrap();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].video_id, "a");
        assert_eq!(persisted[0].title, "alpha news");
    }

    #[tokio::test]
    async fn overlapping_upserts_never_duplicate_ids() {
        let dir = tempdir().unwrap();
        let ledger = repo(&dir);

        ledger
            .upsert(&[record("a", "old title", "", 1), record("b", "b", "", 2)])
            .await
            .unwrap();
        ledger
            .upsert(&[record("a", "new title", "", 1), record("c", "c", "", 3)])
            .await
            .unwrap();

        let persisted = ledger.load().unwrap();
        let mut ids: Vec<&str> = persisted.iter().map(|r| r.video_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);

        // The later extraction overwrote the earlier record for "a".
        let a = persisted.iter().find(|r| r.video_id == "a").unwrap();
        assert_eq!(a.title, "new title");
    }

    #[tokio::test]
    async fn query_on_missing_file_finds_nothing() {
        let dir = tempdir().unwrap();
        let ledger = repo(&dir);

        let page = ledger.query("anything", 1, 10).await.unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn rejects_empty_and_whitespace_queries() {
        let dir = tempdir().unwrap();
        let ledger = repo(&dir);
        ledger.upsert(&[record("a", "alpha", "", 1)]).await.unwrap();

        assert!(matches!(
            ledger.query("", 1, 10).await,
            Err(StorageError::InvalidQuery)
        ));
        assert!(matches!(
            ledger.query("   ", 1, 10).await,
            Err(StorageError::InvalidQuery)
        ));
    }

    #[tokio::test]
    async fn ranks_by_token_score_then_recency() {
        let dir = tempdir().unwrap();
        let ledger = repo(&dir);

        ledger
            .upsert(&[
                record("one", "alpha beta", "", 5),
                record("two", "alpha", "", 1),
                record("three", "gamma alpha", "", 3),
                record("four", "nothing relevant", "", 0),
            ])
            .await
            .unwrap();

        let page = ledger.query("alpha beta", 1, 10).await.unwrap();

        // "alpha beta" scores 2; "alpha" and "gamma alpha" score 1 and tie,
        // broken by the more recent publishedAt; score-0 records are dropped.
        let titles: Vec<&str> = page.results.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["alpha beta", "alpha", "gamma alpha"]);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn matches_descriptions_case_insensitively() {
        let dir = tempdir().unwrap();
        let ledger = repo(&dir);

        ledger
            .upsert(&[
                record("one", "unrelated", "Deep ALPHA dive", 1),
                record("two", "also unrelated", "nothing", 2),
            ])
            .await
            .unwrap();

        let page = ledger.query("Alpha", 1, 10).await.unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].title, "unrelated");
    }

    #[tokio::test]
    async fn paginates_the_sorted_sequence() {
        let dir = tempdir().unwrap();
        let ledger = repo(&dir);

        let batch: Vec<VideoRecord> = (0..15)
            .map(|i| record(&format!("v{i}"), &format!("needle {i}"), "", i))
            .collect();
        ledger.upsert(&batch).await.unwrap();

        let first = ledger.query("needle", 1, 10).await.unwrap();
        assert_eq!(first.results.len(), 10);
        assert_eq!(first.total_pages, 2);

        let second = ledger.query("needle", 2, 10).await.unwrap();
        assert_eq!(second.results.len(), 5);
        assert_eq!(second.total_pages, 2);

        let beyond = ledger.query("needle", 3, 10).await.unwrap();
        assert!(beyond.results.is_empty());
        assert_eq!(beyond.total_pages, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_reads_never_observe_a_torn_write() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(repo(&dir));

        let before: Vec<VideoRecord> = (0..30)
            .map(|i| record(&format!("a{i}"), &format!("needle {i}"), "", i))
            .collect();
        ledger.upsert(&before).await.unwrap();

        let writer = {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let extra: Vec<VideoRecord> = (0..30)
                    .map(|i| record(&format!("b{i}"), &format!("needle b{i}"), "", i))
                    .collect();
                ledger.upsert(&extra).await.unwrap();
            })
        };

        for _ in 0..50 {
            let page = ledger.query("needle", 1, 100).await.unwrap();
            let count = page.results.len();
            assert!(
                count == 30 || count == 60,
                "observed a partial ledger with {count} records"
            );
        }

        writer.await.unwrap();
        let after = ledger.query("needle", 1, 100).await.unwrap();
        assert_eq!(after.results.len(), 60);
    }
}
