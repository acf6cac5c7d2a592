//! Tasks and reflections: the two kinds of entry the assistant stores.

pub mod manager;
pub mod types;

pub use manager::{generate_id, AddedEntry, EntryError, EntryManager, TaskCompletion};
pub use types::{extract_mood_score, EntryKind, Priority};
