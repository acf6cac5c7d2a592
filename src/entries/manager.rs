//! Write path for tasks and reflections.
//!
//! [`EntryManager`] turns user text into stored entries: it resolves the
//! priority or mood, stamps timestamps, generates the id, embeds the text and
//! inserts. Completion is the only in-place update and goes through the
//! store's version compare-and-swap.

use chrono::Local;
use serde::Serialize;
use thiserror::Error;

use super::types::*;
use crate::embedding::EmbeddingProvider;
use crate::store::{Metadata, StoreError, VectorStore};

/// Fresh ids tried before giving up on a colliding insert.
const MAX_ID_ATTEMPTS: usize = 5;
/// Compare-and-swap attempts for a completion racing another writer.
const MAX_COMPLETE_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("entry text must not be empty")]
    EmptyText,

    #[error("mood score must be between 0 and 10, got {0}")]
    InvalidMoodScore(u8),

    #[error("could not allocate a unique {0} id")]
    IdExhausted(EntryKind),

    #[error("task {0} kept changing while being completed")]
    CompletionConflict(String),

    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A freshly stored entry.
#[derive(Debug, Clone, Serialize)]
pub struct AddedEntry {
    pub id: String,
    pub metadata: Metadata,
}

impl AddedEntry {
    pub fn priority(&self) -> Option<Priority> {
        self.metadata
            .get(KEY_PRIORITY_CODE)
            .and_then(|v| v.as_str())
            .and_then(|code| code.parse().ok())
    }

    pub fn mood_score(&self) -> Option<i64> {
        self.metadata.get(KEY_MOOD_SCORE).and_then(|v| v.as_int())
    }
}

/// Outcome of [`EntryManager::complete_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCompletion {
    NotFound,
    Completed,
    AlreadyCompleted,
}

impl TaskCompletion {
    /// Message relayed to the user as-is.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotFound => "Task not found",
            Self::Completed => "Task marked as completed",
            Self::AlreadyCompleted => "Task already completed",
        }
    }
}

impl std::fmt::Display for TaskCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

pub struct EntryManager<'a> {
    store: &'a VectorStore,
    embedder: &'a dyn EmbeddingProvider,
}

impl<'a> EntryManager<'a> {
    pub fn new(store: &'a VectorStore, embedder: &'a dyn EmbeddingProvider) -> Self {
        Self { store, embedder }
    }

    /// Store a task. Without an explicit priority the text is scanned for a
    /// priority keyword.
    pub fn add_task(
        &self,
        text: &str,
        priority: Option<Priority>,
    ) -> Result<AddedEntry, EntryError> {
        let text = non_empty(text)?;

        let mut metadata = Metadata::new();
        metadata.insert(KEY_TYPE.into(), EntryKind::Task.as_str().into());
        metadata.insert(KEY_CREATED_AT.into(), now_timestamp().into());
        metadata.insert(KEY_COMPLETED.into(), false.into());
        if let Some(priority) = priority.or_else(|| Priority::detect(text)) {
            metadata.insert(KEY_PRIORITY_CODE.into(), priority.code().into());
            metadata.insert(KEY_PRIORITY_DESCRIPTION.into(), priority.description().into());
        }

        let id = self.insert_new(EntryKind::Task, text, &metadata)?;
        let priority = metadata
            .get(KEY_PRIORITY_CODE)
            .and_then(|v| v.as_str())
            .unwrap_or("none");
        tracing::info!(id = %id, priority, "task stored");
        Ok(AddedEntry { id, metadata })
    }

    /// Mark a task completed.
    ///
    /// An unknown id, or an id naming something other than a task, is
    /// reported as [`TaskCompletion::NotFound`] rather than an error.
    pub fn complete_task(&self, id: &str) -> Result<TaskCompletion, EntryError> {
        for _ in 0..MAX_COMPLETE_ATTEMPTS {
            let Some(entry) = self.store.get(&[id])?.into_iter().next() else {
                return Ok(TaskCompletion::NotFound);
            };
            let is_task = entry.metadata.get(KEY_TYPE).and_then(|v| v.as_str())
                == Some(EntryKind::Task.as_str());
            if !is_task {
                return Ok(TaskCompletion::NotFound);
            }
            if entry.metadata.get(KEY_COMPLETED).and_then(|v| v.as_bool()) == Some(true) {
                return Ok(TaskCompletion::AlreadyCompleted);
            }

            let mut metadata = entry.metadata;
            metadata.insert(KEY_COMPLETED.into(), true.into());
            metadata.insert(KEY_COMPLETED_AT.into(), now_timestamp().into());

            if self.store.update_if_version(id, entry.version, &metadata)? {
                tracing::info!(id, "task completed");
                return Ok(TaskCompletion::Completed);
            }
            tracing::debug!(id, version = entry.version, "completion lost a race, retrying");
        }
        Err(EntryError::CompletionConflict(id.to_string()))
    }

    /// Store a reflection. Without an explicit mood the text is scanned for
    /// a standalone 0-10 number.
    pub fn add_reflection(
        &self,
        text: &str,
        mood_score: Option<u8>,
    ) -> Result<AddedEntry, EntryError> {
        let text = non_empty(text)?;
        if let Some(score) = mood_score {
            if score > MAX_MOOD_SCORE {
                return Err(EntryError::InvalidMoodScore(score));
            }
        }

        let now = Local::now();
        let mut metadata = Metadata::new();
        metadata.insert(KEY_TYPE.into(), EntryKind::Reflection.as_str().into());
        metadata.insert(
            KEY_CREATED_AT.into(),
            now.format(TIMESTAMP_FORMAT).to_string().into(),
        );
        metadata.insert(KEY_DATE.into(), now.format(DATE_FORMAT).to_string().into());
        if let Some(score) = mood_score.or_else(|| extract_mood_score(text)) {
            metadata.insert(KEY_MOOD_SCORE.into(), score.into());
        }

        let id = self.insert_new(EntryKind::Reflection, text, &metadata)?;
        tracing::info!(id = %id, "reflection stored");
        Ok(AddedEntry { id, metadata })
    }

    /// Embed once, then insert under a fresh id, regenerating on collision.
    fn insert_new(
        &self,
        kind: EntryKind,
        text: &str,
        metadata: &Metadata,
    ) -> Result<String, EntryError> {
        let embedding = self.embedder.embed(text).map_err(EntryError::Embedding)?;

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_id(kind);
            match self.store.insert(&id, text, &embedding, metadata) {
                Ok(()) => return Ok(id),
                Err(StoreError::DuplicateId(dup)) => {
                    tracing::warn!(id = %dup, "generated id collided, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EntryError::IdExhausted(kind))
    }
}

/// `<kind>_<8 lowercase hex>`.
pub fn generate_id(kind: EntryKind) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", kind.id_prefix(), &hex[..8])
}

fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

fn non_empty(text: &str) -> Result<&str, EntryError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(EntryError::EmptyText)
    } else {
        Ok(trimmed)
    }
}
