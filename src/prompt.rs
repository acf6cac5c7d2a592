//! Prompt text for the generation model, plus the fixed help copy.
//!
//! Everything here is pure string formatting over already-retrieved entries.

use crate::entries::types::{
    Priority, KEY_COMPLETED, KEY_CREATED_AT, KEY_MOOD_SCORE, KEY_PRIORITY_CODE,
    KEY_PRIORITY_DESCRIPTION,
};
use crate::store::{Metadata, QueryMatch, StoredEntry};

pub const NO_CONTEXT: &str = "No relevant information found.";

/// Priority legend, one `- Name: description` line per code.
pub fn priority_legend() -> String {
    Priority::ALL
        .iter()
        .map(|p| format!("- {}: {}", p.display_name(), p.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn help_text() -> String {
    format!(
        "Halsey Bot Commands:\n\n\
         /start - Initialize the bot\n\
         /add_task [text] - Add a new task (include priority code in text)\n\
         /complete_task [task_id] - Mark a task as completed\n\
         /add_reflection [text] - Add a reflection with optional mood score (e.g., 'Today was good 8/10')\n\
         /plan_day - Generate a day plan based on current tasks\n\
         /help - Show this help message\n\n\
         You can also ask me natural language questions like:\n\
         - 'Show me my Ferrari tasks'\n\
         - 'What tasks do I need to complete today?'\n\
         - 'How am I feeling this week?'\n\n\
         Priority Codes:\n{}",
        priority_legend()
    )
}

pub const START_TEXT: &str = "Hello! I'm Halsey, your GemmaRAG assistant powered by Gemma 3. \
    I can help you manage tasks and plan your day. \
    Use /help to see available commands.";

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_tasks_per_priority: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            max_tasks_per_priority: 10,
        }
    }
}

impl PromptBuilder {
    pub fn new(max_tasks_per_priority: usize) -> Self {
        Self {
            max_tasks_per_priority,
        }
    }

    /// Day-plan prompt from open tasks and recent reflections.
    ///
    /// Tasks are grouped by priority in plan order; tasks without a code go
    /// last. `today` is `%Y-%m-%d`.
    pub fn plan_prompt(
        &self,
        today: &str,
        tasks: &[StoredEntry],
        reflections: &[StoredEntry],
    ) -> String {
        let mut prompt = format!(
            "Today is {today}. Please create a balanced day plan for me based on these tasks:\n\n"
        );

        for priority in Priority::PLAN_ORDER {
            let bucket: Vec<&StoredEntry> = tasks
                .iter()
                .filter(|t| priority_of(&t.metadata) == Some(priority))
                .collect();
            let header = format!(
                "{} TASKS ({}):",
                priority.code().to_uppercase(),
                priority.description()
            );
            self.push_bucket(&mut prompt, &header, &bucket);
        }

        let untagged: Vec<&StoredEntry> = tasks
            .iter()
            .filter(|t| priority_of(&t.metadata).is_none())
            .collect();
        self.push_bucket(&mut prompt, "OTHER TASKS (no priority code):", &untagged);

        if !reflections.is_empty() {
            prompt.push_str("Recent reflections:\n");
            for r in reflections {
                let line = format!("- [{}] {} {}", created_at(&r.metadata), r.text, mood(&r.metadata));
                prompt.push_str(line.trim_end());
                prompt.push('\n');
            }
        }

        prompt.push_str(
            "\nBased on this information, create a balanced day plan that:\n\
             1. Prioritizes Ferrari and Tesla tasks\n\
             2. Includes breaks and self-care\n\
             3. Is realistic and achievable\n\
             4. Groups similar tasks together when possible\n\
             Please format the plan with time blocks.",
        );
        prompt
    }

    /// Question-answering prompt from the user's query and retrieved context.
    pub fn answer_prompt(
        &self,
        query: &str,
        tasks: &[QueryMatch],
        reflections: &[QueryMatch],
    ) -> String {
        let mut context: Vec<String> = tasks.iter().map(|m| task_context_line(&m.entry)).collect();
        context.extend(reflections.iter().map(|m| {
            let e = &m.entry;
            format!(
                "Reflection [{}]: {} {}",
                created_at(&e.metadata),
                e.text,
                mood(&e.metadata)
            )
            .trim_end()
            .to_string()
        }));

        let context_block = if context.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            context.join("\n")
        };

        format!(
            "The user is asking: '{query}'\n\n\
             Relevant information from their database:\n{context_block}\n\n\
             Here are the priority codes they use:\n{}\n\n\
             Based on the above information, please provide a helpful, concise response that addresses the user's query:",
            priority_legend()
        )
    }

    fn push_bucket(&self, prompt: &mut String, header: &str, bucket: &[&StoredEntry]) {
        if bucket.is_empty() {
            return;
        }
        prompt.push_str(&format!("{header}\n"));
        for task in bucket.iter().take(self.max_tasks_per_priority) {
            prompt.push_str(&format!("- {} (ID: {})\n", task.text, task.id));
        }
        if bucket.len() > self.max_tasks_per_priority {
            prompt.push_str(&format!(
                "- … and {} more\n",
                bucket.len() - self.max_tasks_per_priority
            ));
        }
        prompt.push('\n');
    }
}

fn task_context_line(entry: &StoredEntry) -> String {
    let status = if entry.metadata.get(KEY_COMPLETED).and_then(|v| v.as_bool()) == Some(true) {
        "completed"
    } else {
        "pending"
    };
    let priority = match entry.metadata.get(KEY_PRIORITY_CODE).and_then(|v| v.as_str()) {
        Some(code) => {
            let desc = entry
                .metadata
                .get(KEY_PRIORITY_DESCRIPTION)
                .and_then(|v| v.as_str())
                .unwrap_or("");
            format!("{code} ({desc})")
        }
        None => "no priority".to_string(),
    };
    format!("Task: {} | Status: {status} | Priority: {priority}", entry.text)
}

fn priority_of(metadata: &Metadata) -> Option<Priority> {
    metadata
        .get(KEY_PRIORITY_CODE)
        .and_then(|v| v.as_str())
        .and_then(|code| code.parse().ok())
}

fn created_at(metadata: &Metadata) -> String {
    metadata
        .get(KEY_CREATED_AT)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown date".to_string())
}

/// `Mood: n/10`, or empty when no score was recorded.
fn mood(metadata: &Metadata) -> String {
    metadata
        .get(KEY_MOOD_SCORE)
        .map(|v| format!("Mood: {v}/10"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MetadataValue;

    fn entry(id: &str, text: &str, pairs: &[(&str, MetadataValue)]) -> StoredEntry {
        StoredEntry {
            id: id.into(),
            text: text.into(),
            metadata: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            version: 0,
            stored_at: String::new(),
        }
    }

    fn task(id: &str, text: &str, code: Option<Priority>) -> StoredEntry {
        let mut pairs: Vec<(&str, MetadataValue)> =
            vec![("type", "task".into()), ("completed", false.into())];
        if let Some(p) = code {
            pairs.push(("priority_code", p.code().into()));
            pairs.push(("priority_description", p.description().into()));
        }
        entry(id, text, &pairs)
    }

    #[test]
    fn plan_groups_in_plan_order() {
        let tasks = vec![
            task("task_1", "drink beer", Some(Priority::Budweiser)),
            task("task_2", "follow up", Some(Priority::Greyhound)),
            task("task_3", "ship release", Some(Priority::Ferrari)),
            task("task_4", "tidy desk", None),
        ];
        let prompt = PromptBuilder::default().plan_prompt("2025-01-02", &tasks, &[]);

        assert!(prompt.starts_with(
            "Today is 2025-01-02. Please create a balanced day plan for me based on these tasks:\n\n"
        ));
        let ferrari = prompt.find("FERRARI TASKS (urgent and important):").unwrap();
        let greyhound = prompt.find("GREYHOUND TASKS").unwrap();
        let budweiser = prompt.find("BUDWEISER TASKS").unwrap();
        let other = prompt.find("OTHER TASKS (no priority code):").unwrap();
        assert!(ferrari < greyhound && greyhound < budweiser && budweiser < other);
        assert!(prompt.contains("- ship release (ID: task_3)\n"));
        assert!(!prompt.contains("TESLA TASKS"));
        assert!(!prompt.contains("Recent reflections"));
        assert!(prompt.ends_with("Please format the plan with time blocks."));
    }

    #[test]
    fn plan_caps_each_bucket() {
        let tasks: Vec<StoredEntry> = (0..5)
            .map(|i| task(&format!("task_{i}"), &format!("job {i}"), Some(Priority::Tesla)))
            .collect();
        let prompt = PromptBuilder::new(2).plan_prompt("2025-01-02", &tasks, &[]);
        assert!(prompt.contains("- job 1 (ID: task_1)"));
        assert!(!prompt.contains("job 2"));
        assert!(prompt.contains(
            "TESLA TASKS (semi-urgent and important):\n\
             - job 0 (ID: task_0)\n\
             - job 1 (ID: task_1)\n\
             - … and 3 more\n\n"
        ));
    }

    #[test]
    fn plan_lists_reflections() {
        let reflections = vec![
            entry(
                "reflection_1",
                "Good day",
                &[("created_at", "2025-01-01 20:00:00".into()), ("mood_score", 8i64.into())],
            ),
            entry("reflection_2", "Meh", &[("created_at", "2025-01-01 09:00:00".into())]),
        ];
        let prompt = PromptBuilder::default().plan_prompt("2025-01-02", &[], &reflections);
        assert!(prompt.contains("Recent reflections:\n- [2025-01-01 20:00:00] Good day Mood: 8/10\n"));
        assert!(prompt.contains("- [2025-01-01 09:00:00] Meh\n"));
    }

    #[test]
    fn answer_prompt_with_context() {
        let tasks = vec![QueryMatch {
            entry: task("task_1", "Finish report ferrari", Some(Priority::Ferrari)),
            distance: 0.1,
        }];
        let reflections = vec![QueryMatch {
            entry: entry(
                "reflection_1",
                "Tired",
                &[("created_at", "2025-01-01 21:00:00".into()), ("mood_score", 3i64.into())],
            ),
            distance: 0.2,
        }];
        let prompt = PromptBuilder::default().answer_prompt("what now?", &tasks, &reflections);

        assert!(prompt.starts_with("The user is asking: 'what now?'\n\n"));
        assert!(prompt.contains(
            "Task: Finish report ferrari | Status: pending | Priority: ferrari (urgent and important)\n"
        ));
        assert!(prompt.contains("Reflection [2025-01-01 21:00:00]: Tired Mood: 3/10\n"));
        assert!(prompt.contains("- Greyhound: semi-complete needs follow up\n\n"));
        assert!(prompt.ends_with("addresses the user's query:"));
    }

    #[test]
    fn answer_prompt_without_context() {
        let untagged = vec![QueryMatch {
            entry: task("task_2", "Water plants", None),
            distance: 0.0,
        }];
        let prompt = PromptBuilder::default().answer_prompt("hi", &untagged, &[]);
        assert!(prompt.contains("Priority: no priority"));

        let empty = PromptBuilder::default().answer_prompt("hi", &[], &[]);
        assert!(empty.contains(&format!("database:\n{NO_CONTEXT}\n\n")));
    }

    #[test]
    fn legend_lists_all_codes() {
        let legend = priority_legend();
        assert_eq!(legend.lines().count(), 7);
        assert!(legend.starts_with("- Ferrari: urgent and important"));
        assert!(help_text().ends_with(&legend));
    }
}
