//! Batch ingestion orchestrator.
//!
//! One index request, then the index is walked in fixed-size batches. Batches
//! run one after another in index order; the detail requests (and the
//! classification lookups they trigger) inside a batch run concurrently.
//! Each finished batch is handed to the consumer before the next one starts.

use dexlab_store::CanonicalRow;
use futures::future::join_all;
use std::sync::Arc;

use crate::cache::LookupCache;
use crate::config::IngestConfig;
use crate::normalize::normalize;
use crate::source::{CatalogSource, HttpCatalogSource, IndexEntry, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestProgress {
    /// Index entries processed so far, successes and drops alike.
    pub done: usize,
    pub total: usize,
}

impl IngestProgress {
    pub fn is_complete(&self) -> bool {
        self.done == self.total
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub total: usize,
    pub fetched: usize,
    pub dropped: usize,
    pub batches: usize,
    /// Underlying classification resolutions (cache misses) during the run.
    pub classification_lookups: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("could not retrieve the catalog index: {0}")]
    Index(#[source] SourceError),
    #[error("could not build the catalog client: {0}")]
    Client(#[source] SourceError),
}

pub struct Ingestor {
    source: Arc<dyn CatalogSource>,
    cache: Arc<LookupCache>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(source: Arc<dyn CatalogSource>, config: &IngestConfig) -> Self {
        Self {
            source,
            cache: Arc::new(LookupCache::new()),
            batch_size: config.batch_size.max(1),
        }
    }

    /// Ingestor over the live HTTP catalog.
    pub fn http(config: &IngestConfig) -> Result<Self, IngestError> {
        let source = HttpCatalogSource::new(config).map_err(IngestError::Client)?;
        Ok(Self::new(Arc::new(source), config))
    }

    /// Share a lookup cache across runs (or with another ingestor).
    pub fn with_cache(mut self, cache: Arc<LookupCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<LookupCache> {
        &self.cache
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run a full ingestion.
    ///
    /// `on_batch` receives each batch's normalized rows (in index order, with
    /// failed items removed) as soon as the batch completes; `on_progress`
    /// follows with the cumulative count. Both are called synchronously and
    /// should return quickly.
    ///
    /// Only a failed index request is an error. Failed detail requests drop
    /// their item; failed classification lookups fall back to the default.
    pub async fn ingest<B, P>(
        &self,
        mut on_batch: B,
        mut on_progress: P,
    ) -> Result<IngestSummary, IngestError>
    where
        B: FnMut(Vec<CanonicalRow>),
        P: FnMut(IngestProgress),
    {
        let index = self.source.fetch_index().await.map_err(IngestError::Index)?;
        let total = index.results.len();
        if index.count as usize != total {
            tracing::debug!(
                reported = index.count,
                listed = total,
                "index count differs from listed entries; using listed entries"
            );
        }

        let lookups_before = self.cache.resolutions();
        tracing::info!(total, batch_size = self.batch_size, "starting ingestion");

        let mut summary = IngestSummary {
            total,
            ..Default::default()
        };
        let mut done = 0usize;

        for (number, batch) in index.results.chunks(self.batch_size).enumerate() {
            let fetches = batch.iter().map(|entry| self.fetch_one(entry));
            let rows: Vec<CanonicalRow> = join_all(fetches).await.into_iter().flatten().collect();

            let dropped = batch.len() - rows.len();
            summary.fetched += rows.len();
            summary.dropped += dropped;
            summary.batches += 1;
            tracing::debug!(batch = number, rows = rows.len(), dropped, "batch complete");

            on_batch(rows);

            done = (done + batch.len()).min(total);
            on_progress(IngestProgress { done, total });
        }

        summary.classification_lookups = self.cache.resolutions() - lookups_before;
        tracing::info!(
            fetched = summary.fetched,
            dropped = summary.dropped,
            batches = summary.batches,
            "ingestion finished"
        );
        Ok(summary)
    }

    async fn fetch_one(&self, entry: &IndexEntry) -> Option<CanonicalRow> {
        let record = match self.source.fetch_record(&entry.url).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(url = %entry.url, error = %err, "dropping record");
                return None;
            }
        };

        let species_url = record.species.url.as_str();
        let classification = self
            .cache
            .resolve(species_url, || self.source.fetch_classification(species_url))
            .await;

        Some(normalize(&record, classification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockCatalogSource;

    #[test]
    fn zero_batch_size_is_clamped() {
        let config = IngestConfig {
            batch_size: 0,
            ..Default::default()
        };
        let ingestor = Ingestor::new(Arc::new(MockCatalogSource::new()), &config);
        assert_eq!(ingestor.batch_size(), 1);
    }

    #[tokio::test]
    async fn empty_index_completes_without_callbacks() {
        let ingestor = Ingestor::new(Arc::new(MockCatalogSource::new()), &IngestConfig::default());
        let mut batches = 0;
        let mut reports = 0;

        let summary = ingestor
            .ingest(|_| batches += 1, |_| reports += 1)
            .await
            .unwrap();

        assert_eq!(summary, IngestSummary::default());
        assert_eq!((batches, reports), (0, 0));
    }
}
