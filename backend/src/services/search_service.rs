use crate::errors::StorageError;
use crate::models::ResultPage;
use crate::services::storage::RepositorySet;
use log::debug;

/// Validates and normalizes a search request, then delegates to the
/// repository the source identifier names. The repository's page is
/// returned unchanged; no caching happens at this layer.
pub async fn search_videos(
    repositories: &RepositorySet,
    query: &str,
    source: &str,
    page: usize,
    page_size: usize,
) -> Result<ResultPage, StorageError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(StorageError::InvalidQuery);
    }

    let page = page.max(1);
    let repository = repositories.resolve(source)?;

    debug!("Searching {source} for {query:?} (page {page})");
    repository.query(query, page, page_size).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VideoRecord;
    use crate::services::ledger_repository::LedgerRepository;
    use crate::services::solr_repository::IndexRepository;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn repositories(dir: &tempfile::TempDir) -> RepositorySet {
        RepositorySet::new(
            IndexRepository::new("http://localhost:8983/solr/videos".into()),
            LedgerRepository::new(dir.path().join("videos.json")),
        )
    }

    fn record(id: &str, title: &str) -> VideoRecord {
        VideoRecord {
            video_id: id.into(),
            channel_id: "UC1".into(),
            channel_title: "Channel".into(),
            title: title.into(),
            description: String::new(),
            published_at: Utc::now(),
            url: format!("https://www.youtube.com/watch?v={id}"),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn rejects_empty_query_before_touching_any_backend() {
        let dir = tempdir().unwrap();
        let repos = repositories(&dir);

        assert!(matches!(
            search_videos(&repos, "", "json", 1, 10).await,
            Err(StorageError::InvalidQuery)
        ));
        // Validation fires before delegation, so even the unreachable index
        // backend rejects immediately.
        assert!(matches!(
            search_videos(&repos, "   ", "solr", 1, 10).await,
            Err(StorageError::InvalidQuery)
        ));
    }

    #[tokio::test]
    async fn rejects_unknown_sources() {
        let dir = tempdir().unwrap();
        let repos = repositories(&dir);

        assert!(matches!(
            search_videos(&repos, "alpha", "postgres", 1, 10).await,
            Err(StorageError::InvalidSource(_))
        ));
    }

    #[tokio::test]
    async fn clamps_page_to_at_least_one() {
        let dir = tempdir().unwrap();
        let repos = repositories(&dir);

        let ledger = repos.resolve("json").unwrap();
        ledger.upsert(&[record("a", "alpha")]).await.unwrap();

        let page = search_videos(&repos, "alpha", "json", 0, 10).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.results.len(), 1);
    }

    #[tokio::test]
    async fn trims_the_query_before_matching() {
        let dir = tempdir().unwrap();
        let repos = repositories(&dir);

        let ledger = repos.resolve("json").unwrap();
        ledger.upsert(&[record("a", "alpha")]).await.unwrap();

        let page = search_videos(&repos, "  alpha  ", "json", 1, 10)
            .await
            .unwrap();
        assert_eq!(page.results.len(), 1);
    }
}
