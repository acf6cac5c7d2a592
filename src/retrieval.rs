//! Read path: similarity search and scans over stored entries.

use anyhow::{Context, Result};

use crate::embedding::EmbeddingProvider;
use crate::entries::types::{
    EntryKind, Priority, KEY_COMPLETED, KEY_PRIORITY_CODE, KEY_TYPE,
};
use crate::store::{MetadataFilter, QueryMatch, ScanOrder, StoredEntry, VectorStore};

pub const DEFAULT_TOP_K: usize = 5;

pub struct Retriever<'a> {
    store: &'a VectorStore,
    embedder: &'a dyn EmbeddingProvider,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a VectorStore, embedder: &'a dyn EmbeddingProvider) -> Self {
        Self { store, embedder }
    }

    /// Tasks most similar to `query`.
    ///
    /// With no explicit filter, a priority keyword in the query narrows the
    /// search to that code. The result is always restricted to tasks.
    pub fn query_tasks(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<MetadataFilter>,
    ) -> Result<Vec<QueryMatch>> {
        let mut filter = match filter {
            Some(f) if !f.is_empty() => f,
            _ => {
                let mut inferred = MetadataFilter::new();
                if let Some(priority) = Priority::detect(query) {
                    tracing::debug!(priority = priority.code(), "priority inferred from query");
                    inferred.set(KEY_PRIORITY_CODE, priority.code());
                }
                inferred
            }
        };
        filter.set(KEY_TYPE, EntryKind::Task.as_str());

        self.similar(query, top_k, &filter)
    }

    /// Reflections most similar to `query`.
    pub fn query_reflections(&self, query: &str, top_k: usize) -> Result<Vec<QueryMatch>> {
        let filter = MetadataFilter::new().with(KEY_TYPE, EntryKind::Reflection.as_str());
        self.similar(query, top_k, &filter)
    }

    /// Every task not yet completed, oldest first.
    pub fn incomplete_tasks(&self) -> Result<Vec<StoredEntry>> {
        let filter = MetadataFilter::new()
            .with(KEY_TYPE, EntryKind::Task.as_str())
            .with(KEY_COMPLETED, false);
        self.store
            .scan(&filter, None, ScanOrder::OldestFirst)
            .context("failed to scan incomplete tasks")
    }

    /// The `limit` most recently stored reflections, newest first.
    pub fn recent_reflections(&self, limit: usize) -> Result<Vec<StoredEntry>> {
        let filter = MetadataFilter::new().with(KEY_TYPE, EntryKind::Reflection.as_str());
        self.store
            .scan(&filter, Some(limit), ScanOrder::NewestFirst)
            .context("failed to scan reflections")
    }

    fn similar(
        &self,
        query: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<QueryMatch>> {
        let embedding = self.embedder.embed(query).context("failed to embed query")?;
        self.store
            .query(&embedding, top_k, Some(filter))
            .context("vector query failed")
    }
}
