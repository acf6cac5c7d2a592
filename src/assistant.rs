//! The assistant: shared state plus every user-facing action.
//!
//! [`Assistant`] owns the store, the embedding provider, the generation
//! client and config. Each action runs its embedding and SQLite work on the
//! blocking pool and returns plain reply text, so chat transports and the
//! CLI stay thin.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Local;

use crate::config::HalseyConfig;
use crate::embedding::EmbeddingProvider;
use crate::entries::types::{DATE_FORMAT, KEY_COMPLETED, KEY_PRIORITY_CODE};
use crate::entries::{AddedEntry, EntryManager, Priority, TaskCompletion};
use crate::generation::{GenerationOptions, Generator, EMPTY_RESPONSE_MESSAGE};
use crate::prompt::{self, PromptBuilder};
use crate::retrieval::Retriever;
use crate::store::{MetadataFilter, QueryMatch, VectorStore};

/// A resolved user intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Start,
    Help,
    /// `/add_task`; text may be empty, which prompts for details.
    AddTask(String),
    /// `/complete_task`; id may be empty.
    CompleteTask(String),
    /// `/add_reflection` with an explicit `N/10` rating if one was given.
    AddReflection { text: String, mood: Option<u8> },
    PlanDay,
    /// Free text asking to create a task that names a priority code.
    CreateTask(String),
    /// Free text asking to see tasks.
    ListTasks { query: String, filter: MetadataFilter },
    /// Anything else: answered by the model with retrieved context.
    Ask(String),
}

pub const PLAN_NOTICE: &str = "Generating your day plan... This might take a moment.";
pub const THINKING_NOTICE: &str = "Thinking...";
pub const NO_TASKS_FOUND: &str = "No matching tasks found.";

impl Request {
    /// Short label for logs; message text stays out of them.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::AddTask(_) => "add_task",
            Self::CompleteTask(_) => "complete_task",
            Self::AddReflection { .. } => "add_reflection",
            Self::PlanDay => "plan_day",
            Self::CreateTask(_) => "create_task",
            Self::ListTasks { .. } => "list_tasks",
            Self::Ask(_) => "ask",
        }
    }

    /// Message to send before a slow request starts.
    pub fn interim_notice(&self) -> Option<&'static str> {
        match self {
            Self::PlanDay => Some(PLAN_NOTICE),
            Self::Ask(_) => Some(THINKING_NOTICE),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Assistant {
    store: Arc<Mutex<VectorStore>>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Generator,
    config: Arc<HalseyConfig>,
}

impl Assistant {
    pub fn new(
        store: VectorStore,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Generator,
        config: Arc<HalseyConfig>,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            embedder,
            generator,
            config,
        }
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Close the store. Fails if another clone of this assistant is alive.
    pub fn close(self) -> Result<()> {
        let store = Arc::try_unwrap(self.store)
            .map_err(|_| anyhow::anyhow!("store is still shared, cannot close"))?
            .into_inner()
            .map_err(|e| anyhow::anyhow!("store lock poisoned: {e}"))?;
        store.close().context("failed to close store")?;
        tracing::info!("store closed");
        Ok(())
    }

    /// Run `f` against the store and embedder on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&VectorStore, &dyn EmbeddingProvider) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || {
            let store = store
                .lock()
                .map_err(|e| anyhow::anyhow!("store lock poisoned: {e}"))?;
            f(&store, embedder.as_ref())
        })
        .await
        .context("store task failed")?
    }

    pub async fn add_task(&self, text: &str, priority: Option<Priority>) -> Result<AddedEntry> {
        let text = text.to_string();
        self.blocking(move |store, embedder| {
            Ok(EntryManager::new(store, embedder).add_task(&text, priority)?)
        })
        .await
    }

    pub async fn complete_task(&self, id: &str) -> Result<TaskCompletion> {
        let id = id.to_string();
        self.blocking(move |store, embedder| {
            Ok(EntryManager::new(store, embedder).complete_task(&id)?)
        })
        .await
    }

    pub async fn add_reflection(&self, text: &str, mood: Option<u8>) -> Result<AddedEntry> {
        let text = text.to_string();
        self.blocking(move |store, embedder| {
            Ok(EntryManager::new(store, embedder).add_reflection(&text, mood)?)
        })
        .await
    }

    pub async fn find_tasks(
        &self,
        query: &str,
        filter: Option<MetadataFilter>,
    ) -> Result<Vec<QueryMatch>> {
        let query = query.to_string();
        let top_k = self.config.retrieval.default_top_k;
        self.blocking(move |store, embedder| {
            Retriever::new(store, embedder).query_tasks(&query, top_k, filter)
        })
        .await
    }

    /// Build the day-plan prompt from open tasks and recent reflections.
    pub async fn plan_prompt(&self) -> Result<String> {
        let reflections = self.config.prompt.plan_recent_reflections;
        let builder = PromptBuilder::new(self.config.prompt.plan_max_tasks_per_priority);
        let today = Local::now().format(DATE_FORMAT).to_string();

        self.blocking(move |store, embedder| {
            let retriever = Retriever::new(store, embedder);
            let tasks = retriever.incomplete_tasks()?;
            let recent = retriever.recent_reflections(reflections)?;
            tracing::debug!(tasks = tasks.len(), reflections = recent.len(), "plan context");
            Ok(builder.plan_prompt(&today, &tasks, &recent))
        })
        .await
    }

    /// Build the answer prompt for a free-form question.
    pub async fn answer_prompt(&self, query: &str) -> Result<String> {
        let query = query.to_string();
        let task_k = self.config.retrieval.answer_task_k;
        let reflection_k = self.config.retrieval.answer_reflection_k;
        let builder = PromptBuilder::new(self.config.prompt.plan_max_tasks_per_priority);

        self.blocking(move |store, embedder| {
            let retriever = Retriever::new(store, embedder);
            let tasks = retriever.query_tasks(&query, task_k, None)?;
            let reflections = retriever.query_reflections(&query, reflection_k)?;
            Ok(builder.answer_prompt(&query, &tasks, &reflections))
        })
        .await
    }

    /// Generate text, degrading a generation failure to its user message.
    async fn generate_or_explain(&self, prompt: &str) -> String {
        let options = GenerationOptions::from(&self.config.generation);
        match self.generator.generate(prompt, &options).await {
            Ok(text) if text.trim().is_empty() => {
                tracing::warn!("model returned an empty response");
                EMPTY_RESPONSE_MESSAGE.to_string()
            }
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                e.user_message().to_string()
            }
        }
    }

    pub async fn plan_day(&self) -> Result<String> {
        let prompt = self.plan_prompt().await?;
        Ok(self.generate_or_explain(&prompt).await)
    }

    pub async fn answer(&self, query: &str) -> Result<String> {
        let prompt = self.answer_prompt(query).await?;
        Ok(self.generate_or_explain(&prompt).await)
    }

    /// Produce the reply text for a request.
    pub async fn respond(&self, request: Request) -> Result<String> {
        match request {
            Request::Start => Ok(prompt::START_TEXT.to_string()),
            Request::Help => Ok(prompt::help_text()),
            Request::AddTask(text) => {
                if text.trim().is_empty() {
                    return Ok("Please provide task details after /add_task.".into());
                }
                let added = self.add_task(&text, None).await?;
                let priority = added
                    .priority()
                    .map(|p| format!("Priority: {}", p.description()))
                    .unwrap_or_default();
                Ok(format!("Task stored! ID: {}\n{priority}", added.id)
                    .trim_end()
                    .to_string())
            }
            Request::CompleteTask(id) => {
                let id = id.trim();
                if id.is_empty() {
                    return Ok("Please provide task ID after /complete_task.".into());
                }
                Ok(self.complete_task(id).await?.message().to_string())
            }
            Request::AddReflection { text, mood } => {
                if text.trim().is_empty() {
                    return Ok("Please provide reflection details after /add_reflection.".into());
                }
                let added = self.add_reflection(&text, mood).await?;
                let mood = added
                    .mood_score()
                    .map(|m| format!("Mood score: {m}/10"))
                    .unwrap_or_default();
                Ok(format!("Reflection stored! ID: {}\n{mood}", added.id)
                    .trim_end()
                    .to_string())
            }
            Request::PlanDay => {
                let plan = self.plan_day().await?;
                Ok(format!("Here's your plan for today:\n\n{plan}"))
            }
            Request::CreateTask(text) => {
                let added = self.add_task(&text, None).await?;
                let description = added
                    .priority()
                    .map(|p| p.description())
                    .unwrap_or("Not specified");
                Ok(format!("Task added! ID: {}\nPriority: {description}", added.id))
            }
            Request::ListTasks { query, filter } => {
                let matches = self.find_tasks(&query, Some(filter)).await?;
                Ok(format_task_list(&matches))
            }
            Request::Ask(query) => self.answer(&query).await,
        }
    }
}

/// Numbered task listing with status, priority tag and id.
pub fn format_task_list(matches: &[QueryMatch]) -> String {
    if matches.is_empty() {
        return NO_TASKS_FOUND.to_string();
    }

    let mut out = String::from("Here are your tasks:\n\n");
    for (i, m) in matches.iter().enumerate() {
        let meta = &m.entry.metadata;
        let status = if meta.get(KEY_COMPLETED).and_then(|v| v.as_bool()) == Some(true) {
            "✓ DONE"
        } else {
            "◯ PENDING"
        };
        let mut line = format!("{}. {status}", i + 1);
        if let Some(code) = meta.get(KEY_PRIORITY_CODE).and_then(|v| v.as_str()) {
            line.push_str(&format!(" [{}]", code.to_uppercase()));
        }
        out.push_str(&format!("{line} {}\nID: {}\n\n", m.entry.text, m.entry.id));
    }
    out
}
