//! Entry kinds, the priority taxonomy, and metadata key names.
//!
//! [`Priority`] is the seven-code vocabulary users type into task text
//! ("ferrari", "tesla", ...). Detection order and plan order differ, so both
//! are spelled out as constants.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Metadata key holding the entry kind.
pub const KEY_TYPE: &str = "type";
pub const KEY_CREATED_AT: &str = "created_at";
pub const KEY_COMPLETED: &str = "completed";
pub const KEY_COMPLETED_AT: &str = "completed_at";
pub const KEY_PRIORITY_CODE: &str = "priority_code";
pub const KEY_PRIORITY_DESCRIPTION: &str = "priority_description";
pub const KEY_DATE: &str = "date";
pub const KEY_MOOD_SCORE: &str = "mood_score";

/// Timestamp layout for `created_at` / `completed_at`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Layout for a reflection's `date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const MAX_MOOD_SCORE: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Task,
    Reflection,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Reflection => "reflection",
        }
    }

    /// Prefix for generated ids, e.g. `task_` in `task_1a2b3c4d`.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Task => "task_",
            Self::Reflection => "reflection_",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(Self::Task),
            "reflection" => Ok(Self::Reflection),
            _ => Err(format!("unknown entry kind: {s}")),
        }
    }
}

/// Task priority codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Urgent and important.
    Ferrari,
    /// Semi-urgent and important.
    Tesla,
    /// Not urgent but important.
    Amazon,
    /// Urgent, not important but necessary.
    Suzuki,
    /// Semi-urgent, not important but eventually necessary.
    Orange,
    /// Neither important nor urgent.
    Budweiser,
    /// Semi-complete, needs follow up.
    Greyhound,
}

impl Priority {
    /// Every code, in keyword-detection order. The first match in text wins.
    pub const ALL: [Priority; 7] = [
        Self::Ferrari,
        Self::Tesla,
        Self::Amazon,
        Self::Suzuki,
        Self::Orange,
        Self::Budweiser,
        Self::Greyhound,
    ];

    /// Order of sections in the day plan.
    pub const PLAN_ORDER: [Priority; 7] = [
        Self::Ferrari,
        Self::Tesla,
        Self::Amazon,
        Self::Suzuki,
        Self::Orange,
        Self::Greyhound,
        Self::Budweiser,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Ferrari => "ferrari",
            Self::Tesla => "tesla",
            Self::Amazon => "amazon",
            Self::Suzuki => "suzuki",
            Self::Orange => "orange",
            Self::Budweiser => "budweiser",
            Self::Greyhound => "greyhound",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Ferrari => "urgent and important",
            Self::Tesla => "semi-urgent and important",
            Self::Amazon => "not urgent but important",
            Self::Suzuki => "urgent, not important but necessary",
            Self::Orange => "semi-urgent, not important but eventually necessary",
            Self::Budweiser => "not important not urgent",
            Self::Greyhound => "semi-complete needs follow up",
        }
    }

    /// Capitalized code as used in prose ("Ferrari").
    pub fn display_name(&self) -> String {
        let code = self.code();
        let mut chars = code.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Find a priority keyword in free text, case-insensitively.
    ///
    /// Plain substring matching: "orange juice" is an Orange task.
    pub fn detect(text: &str) -> Option<Priority> {
        let lower = text.to_lowercase();
        Self::ALL.into_iter().find(|p| lower.contains(p.code()))
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.code() == wanted)
            .ok_or_else(|| format!("unknown priority code: {s}"))
    }
}

fn mood_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b([0-9]|10)\b").expect("static regex"))
}

/// First standalone integer 0-10 in `text`.
///
/// This is a loose heuristic: "I have 3 cats" yields 3.
pub fn extract_mood_score(text: &str) -> Option<u8> {
    mood_pattern()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_is_case_insensitive() {
        assert_eq!(Priority::detect("Finish report FERRARI"), Some(Priority::Ferrari));
        assert_eq!(Priority::detect("water the plants"), None);
    }

    #[test]
    fn detect_uses_enumeration_order() {
        // greyhound appears first in the text but ferrari wins
        assert_eq!(
            Priority::detect("greyhound follow-up, also ferrari"),
            Some(Priority::Ferrari)
        );
        assert_eq!(
            Priority::detect("budweiser then greyhound"),
            Some(Priority::Budweiser)
        );
    }

    #[test]
    fn plan_order_swaps_last_two() {
        assert_eq!(Priority::PLAN_ORDER[5], Priority::Greyhound);
        assert_eq!(Priority::PLAN_ORDER[6], Priority::Budweiser);
        assert_eq!(Priority::ALL[5], Priority::Budweiser);
    }

    #[test]
    fn parse_priority_code() {
        assert_eq!("Tesla".parse::<Priority>().unwrap(), Priority::Tesla);
        assert!("porsche".parse::<Priority>().is_err());
        assert_eq!(Priority::Suzuki.display_name(), "Suzuki");
    }

    #[test]
    fn mood_extraction() {
        assert_eq!(extract_mood_score("Feeling great today 8"), Some(8));
        assert_eq!(extract_mood_score("I have 3 cats"), Some(3));
        assert_eq!(extract_mood_score("a solid 10"), Some(10));
        assert_eq!(extract_mood_score("ran 15 km"), None);
        assert_eq!(extract_mood_score("no numbers"), None);
    }

    #[test]
    fn kind_round_trip() {
        assert_eq!("reflection".parse::<EntryKind>().unwrap(), EntryKind::Reflection);
        assert_eq!(EntryKind::Task.id_prefix(), "task_");
    }
}
