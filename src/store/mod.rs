//! Persistent vector store backed by SQLite and sqlite-vec.
//!
//! A [`VectorStore`] owns one connection and exposes a single named
//! collection of `(id, text, embedding, metadata)` records. It is opened once
//! at startup, shared by reference, and closed explicitly at shutdown.
//!
//! Similarity queries rank by ascending L2 distance. A metadata filter can be
//! applied in one of two ways, selected by [`FilterMode`]:
//!
//! - [`FilterMode::Combined`] narrows the candidate rows in SQL before ranking,
//!   so up to `k` filtered matches come back whenever that many exist.
//! - [`FilterMode::PostHoc`] asks the vec0 index for the nearest `k` and then
//!   drops the ones the filter rejects, which may leave fewer than `k`.

pub mod metadata;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use metadata::{Metadata, MetadataFilter, MetadataValue};

use crate::db;

/// Errors raised by [`VectorStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entry id already exists: {0}")]
    DuplicateId(String),

    #[error("embedding has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("database holds {stored}-dimensional embeddings but {configured} were requested")]
    IncompatibleStore { stored: usize, configured: usize },

    #[error("got {ids} ids but {metadatas} metadata maps")]
    LengthMismatch { ids: usize, metadatas: usize },

    #[error("metadata (de)serialization failed: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// How a metadata filter combines with a vector query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Filter first, then rank the surviving rows by exact distance.
    #[default]
    Combined,
    /// Rank with the vec0 index, then filter the top-k.
    PostHoc,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Combined => "combined",
            Self::PostHoc => "post_hoc",
        }
    }
}

/// Ordering for [`VectorStore::scan`], by insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    OldestFirst,
    NewestFirst,
}

/// A stored record. The embedding stays in the vector table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEntry {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Bumped on every metadata write; used for compare-and-swap updates.
    pub version: i64,
    /// RFC 3339 insertion timestamp (storage bookkeeping, not entry metadata).
    pub stored_at: String,
}

/// One similarity hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMatch {
    pub entry: StoredEntry,
    pub distance: f64,
}

pub struct VectorStore {
    conn: Connection,
    collection: String,
    dimensions: usize,
    filter_mode: FilterMode,
}

const ENTRY_COLUMNS: &str = "e.id, e.text, e.metadata, e.version, e.created_at";

impl VectorStore {
    /// Open (or create) the store at `path` for the named collection.
    pub fn open(
        path: impl AsRef<Path>,
        collection: &str,
        dimensions: usize,
    ) -> anyhow::Result<Self> {
        let conn = db::open_database(path, dimensions)?;
        Ok(Self::from_connection(conn, collection, dimensions)?)
    }

    /// In-memory store, mostly for tests and one-off tooling.
    pub fn open_in_memory(collection: &str, dimensions: usize) -> anyhow::Result<Self> {
        let conn = db::open_memory_database(dimensions)?;
        Ok(Self::from_connection(conn, collection, dimensions)?)
    }

    /// Wrap an initialized connection. Records the embedding width on first use
    /// and refuses a connection whose vectors have a different width.
    pub fn from_connection(
        conn: Connection,
        collection: &str,
        dimensions: usize,
    ) -> StoreResult<Self> {
        match db::migrations::get_embedding_dim(&conn)? {
            Some(stored) if stored != dimensions => {
                return Err(StoreError::IncompatibleStore {
                    stored,
                    configured: dimensions,
                });
            }
            Some(_) => {}
            None => db::migrations::set_embedding_dim(&conn, dimensions)?,
        }

        Ok(Self {
            conn,
            collection: collection.to_string(),
            dimensions,
            filter_mode: FilterMode::default(),
        })
    }

    /// Record `model` as the embedding model on first use. Returns the
    /// previously recorded model when it differs.
    pub fn record_embedding_model(&self, model: &str) -> StoreResult<Option<String>> {
        match db::migrations::get_embedding_model(&self.conn)? {
            None => {
                db::migrations::set_embedding_model(&self.conn, model)?;
                Ok(None)
            }
            Some(stored) if stored != model => Ok(Some(stored)),
            Some(_) => Ok(None),
        }
    }

    pub fn with_filter_mode(mut self, mode: FilterMode) -> Self {
        self.filter_mode = mode;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Close the connection, surfacing any error SQLite reports on shutdown.
    pub fn close(self) -> StoreResult<()> {
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }

    /// Insert a new record. Fails with [`StoreError::DuplicateId`] if the id
    /// exists anywhere in the database; nothing is overwritten.
    pub fn insert(
        &self,
        id: &str,
        text: &str,
        embedding: &[f32],
        metadata: &Metadata,
    ) -> StoreResult<()> {
        if embedding.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }

        let metadata_json = serde_json::to_string(metadata)?;
        let now = chrono::Utc::now().to_rfc3339();

        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO entries (id, collection, text, metadata, version, created_at) \
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![id, self.collection, text, metadata_json, now],
        )?;
        if inserted == 0 {
            return Err(StoreError::DuplicateId(id.to_string()));
        }

        tx.execute(
            "INSERT INTO entries_vec (id, collection, embedding) VALUES (?1, ?2, ?3)",
            params![id, self.collection, embedding_to_bytes(embedding)],
        )?;
        tx.commit()?;

        tracing::debug!(id, collection = %self.collection, "entry inserted");
        Ok(())
    }

    /// Fetch records by id, in input order. Unknown ids are skipped.
    pub fn get(&self, ids: &[&str]) -> StoreResult<Vec<StoredEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> = (2..=ids.len() + 1).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e \
             WHERE e.collection = ?1 AND e.id IN ({})",
            placeholders.join(", ")
        );

        let mut values = vec![Value::Text(self.collection.clone())];
        values.extend(ids.iter().map(|id| Value::Text(id.to_string())));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut by_id: HashMap<String, StoredEntry> = stmt
            .query_map(params_from_iter(values), row_to_entry)?
            .map(|r| r.map(|e| (e.id.clone(), e)))
            .collect::<Result<_, _>>()?;

        Ok(ids.iter().filter_map(|id| by_id.remove(*id)).collect())
    }

    /// Replace the metadata map of each id wholesale. Text and embedding are
    /// untouched. Returns the number of records updated.
    pub fn update(&self, ids: &[&str], metadatas: &[Metadata]) -> StoreResult<usize> {
        if ids.len() != metadatas.len() {
            return Err(StoreError::LengthMismatch {
                ids: ids.len(),
                metadatas: metadatas.len(),
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut updated = 0;
        for (id, metadata) in ids.iter().zip(metadatas) {
            updated += tx.execute(
                "UPDATE entries SET metadata = ?1, version = version + 1 \
                 WHERE id = ?2 AND collection = ?3",
                params![serde_json::to_string(metadata)?, id, self.collection],
            )?;
        }
        tx.commit()?;
        Ok(updated)
    }

    /// Replace one record's metadata only if its version is still
    /// `expected_version`. Returns `false` when another writer got there first.
    pub fn update_if_version(
        &self,
        id: &str,
        expected_version: i64,
        metadata: &Metadata,
    ) -> StoreResult<bool> {
        let rows = self.conn.execute(
            "UPDATE entries SET metadata = ?1, version = version + 1 \
             WHERE id = ?2 AND collection = ?3 AND version = ?4",
            params![
                serde_json::to_string(metadata)?,
                id,
                self.collection,
                expected_version
            ],
        )?;
        Ok(rows == 1)
    }

    /// All records matching `filter`, in insertion order, optionally limited.
    pub fn scan(
        &self,
        filter: &MetadataFilter,
        limit: Option<usize>,
        order: ScanOrder,
    ) -> StoreResult<Vec<StoredEntry>> {
        let mut values = vec![Value::Text(self.collection.clone())];
        let where_filter = filter_clause(filter, &mut values);
        let direction = match order {
            ScanOrder::OldestFirst => "ASC",
            ScanOrder::NewestFirst => "DESC",
        };

        let mut sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e \
             WHERE e.collection = ?1{where_filter} ORDER BY e.rowid {direction}"
        );
        if let Some(limit) = limit {
            values.push(Value::Integer(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", values.len()));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Top-`k` records by ascending distance to `embedding`, filtered
    /// according to the store's [`FilterMode`].
    pub fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> StoreResult<Vec<QueryMatch>> {
        self.query_with_mode(embedding, k, filter, self.filter_mode)
    }

    pub fn query_with_mode(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
        mode: FilterMode,
    ) -> StoreResult<Vec<QueryMatch>> {
        if embedding.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let empty = MetadataFilter::new();
        let filter = filter.unwrap_or(&empty);

        let results = match mode {
            FilterMode::Combined => self.query_combined(embedding, k, filter)?,
            FilterMode::PostHoc => self.query_post_hoc(embedding, k, filter)?,
        };

        tracing::debug!(
            k,
            mode = mode.as_str(),
            filtered = !filter.is_empty(),
            returned = results.len(),
            "vector query"
        );
        Ok(results)
    }

    /// Number of records in this collection.
    pub fn count(&self) -> StoreResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?)
    }

    /// Record counts grouped by the `type` metadata key.
    pub fn count_by_type(&self) -> StoreResult<BTreeMap<String, i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(json_extract(metadata, '$.type'), '(none)'), COUNT(*) \
             FROM entries WHERE collection = ?1 GROUP BY 1",
        )?;
        let rows = stmt
            .query_map(params![self.collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Filter in SQL, then rank every surviving row by exact L2 distance.
    fn query_combined(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> StoreResult<Vec<QueryMatch>> {
        let mut values = vec![
            Value::Blob(embedding_to_bytes(embedding).to_vec()),
            Value::Text(self.collection.clone()),
        ];
        let where_filter = filter_clause(filter, &mut values);
        values.push(Value::Integer(k as i64));
        let limit_idx = values.len();

        let sql = format!(
            "SELECT {ENTRY_COLUMNS}, vec_distance_l2(v.embedding, ?1) AS distance \
             FROM entries e JOIN entries_vec v ON v.id = e.id \
             WHERE e.collection = ?2{where_filter} \
             ORDER BY distance ASC, e.rowid ASC LIMIT ?{limit_idx}"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(QueryMatch {
                    entry: row_to_entry(row)?,
                    distance: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// KNN over this collection's vec0 partition, then drop rows the filter
    /// rejects.
    fn query_post_hoc(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> StoreResult<Vec<QueryMatch>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, distance FROM entries_vec \
             WHERE embedding MATCH ?1 AND k = ?2 AND collection = ?3 \
             ORDER BY distance",
        )?;
        let nearest: Vec<(String, f64)> = stmt
            .query_map(
                params![embedding_to_bytes(embedding), k as i64, self.collection],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<&str> = nearest.iter().map(|(id, _)| id.as_str()).collect();
        let mut entries: HashMap<String, StoredEntry> = self
            .get(&ids)?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        Ok(nearest
            .into_iter()
            .filter_map(|(id, distance)| {
                entries
                    .remove(&id)
                    .map(|entry| QueryMatch { entry, distance })
            })
            .filter(|m| filter.matches(&m.entry.metadata))
            .collect())
    }
}

/// Render `AND json_extract(e.metadata, <path>) = ?m` for each condition,
/// appending the bound values to `values`. Plain keys get a literal path so
/// `idx_entries_collection_type` applies; anything else is bound.
fn filter_clause(filter: &MetadataFilter, values: &mut Vec<Value>) -> String {
    let mut clause = String::new();
    for (key, value) in filter.conditions() {
        let path = match metadata::literal_json_path(key) {
            Some(literal) => literal,
            None => {
                values.push(Value::Text(metadata::json_path(key)));
                format!("?{}", values.len())
            }
        };
        values.push(value.to_sql_value());
        let value_idx = values.len();
        clause.push_str(&format!(
            " AND json_extract(e.metadata, {path}) = ?{value_idx}"
        ));
    }
    clause
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<StoredEntry> {
    let metadata_json: String = row.get(2)?;
    let metadata: Metadata = serde_json::from_str(&metadata_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(StoredEntry {
        id: row.get(0)?,
        text: row.get(1)?,
        metadata,
        version: row.get(3)?,
        stored_at: row.get(4)?,
    })
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}
