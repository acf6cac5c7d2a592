//! Halsey: a personal task and reflection assistant.
//!
//! Tasks and reflections are stored as text with a local embedding and a
//! small metadata map in SQLite. Questions and day plans are answered by
//! retrieving related entries and prompting a local model served by Ollama.
//! Users talk to it over Telegram or the `halsey` CLI.
//!
//! Tasks carry one of seven priority codes:
//!
//! | Code | Meaning |
//! |------|---------|
//! | **ferrari** | urgent and important |
//! | **tesla** | semi-urgent and important |
//! | **amazon** | not urgent but important |
//! | **suzuki** | urgent, not important but necessary |
//! | **orange** | semi-urgent, not important but eventually necessary |
//! | **budweiser** | not important not urgent |
//! | **greyhound** | semi-complete needs follow up |
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for L2 nearest-neighbour search and JSON metadata filters
//! - **Embeddings**: local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions)
//! - **Generation**: Ollama `/api/generate`, `gemma3:1b` by default
//! - **Chat**: Telegram long polling via teloxide
//!
//! # Modules
//!
//! - [`config`]: TOML config and environment overrides
//! - [`db`]: SQLite setup, schema, migrations and health checks
//! - [`store`]: the vector store and metadata filters
//! - [`embedding`]: text-to-vector pipeline
//! - [`entries`]: task and reflection creation, task completion
//! - [`retrieval`]: similarity queries and scans
//! - [`prompt`]: plan and answer prompts
//! - [`generation`]: Ollama client
//! - [`assistant`]: shared state and every user action
//! - [`bot`]: command parsing, routing and the Telegram transport
//! - [`preflight`]: startup checks for `halsey serve`

pub mod assistant;
pub mod bot;
pub mod config;
pub mod db;
pub mod embedding;
pub mod entries;
pub mod generation;
pub mod preflight;
pub mod prompt;
pub mod retrieval;
pub mod store;
