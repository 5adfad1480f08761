use crate::errors::StorageError;
use crate::models::{ResultPage, VideoRecord};
use crate::services::ledger_repository::LedgerRepository;
use crate::services::solr_repository::IndexRepository;
use std::sync::Arc;

/// The closed set of storage backends. Selection happens by an explicit
/// source identifier (`"solr"` or `"json"`), never by inspecting state.
pub enum StorageRepository {
    Index(IndexRepository),
    Ledger(LedgerRepository),
}

impl StorageRepository {
    /// Insert-or-replace each record by videoId. Returns the number of
    /// records written.
    pub async fn upsert(&self, records: &[VideoRecord]) -> Result<usize, StorageError> {
        match self {
            StorageRepository::Index(repo) => repo.upsert(records).await,
            StorageRepository::Ledger(repo) => repo.upsert(records).await,
        }
    }

    /// Full-text query over title and description, paginated. Both variants
    /// reject an empty query instead of returning everything.
    pub async fn query(
        &self,
        text: &str,
        page: usize,
        page_size: usize,
    ) -> Result<ResultPage, StorageError> {
        match self {
            StorageRepository::Index(repo) => repo.query(text, page, page_size).await,
            StorageRepository::Ledger(repo) => repo.query(text, page, page_size).await,
        }
    }
}

/// One instance of each backend, resolved per request by source identifier.
pub struct RepositorySet {
    index: Arc<StorageRepository>,
    ledger: Arc<StorageRepository>,
}

impl RepositorySet {
    pub fn new(index: IndexRepository, ledger: LedgerRepository) -> Self {
        RepositorySet {
            index: Arc::new(StorageRepository::Index(index)),
            ledger: Arc::new(StorageRepository::Ledger(ledger)),
        }
    }

    pub fn resolve(&self, source: &str) -> Result<Arc<StorageRepository>, StorageError> {
        match source {
            "solr" => Ok(self.index.clone()),
            "json" => Ok(self.ledger.clone()),
            other => Err(StorageError::InvalidSource(other.to_string())),
        }
    }
}

/// ceil(total_matches / page_size); zero matches mean zero pages.
pub fn total_pages(total_matches: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total_matches.div_ceil(page_size)
}

pub fn validate_query_text(text: &str) -> Result<(), StorageError> {
    if text.trim().is_empty() {
        return Err(StorageError::InvalidQuery);
    }
    Ok(())
}
