//! Chat surface: turning incoming text into [`Request`]s.
//!
//! Parsing and routing are transport-independent; [`telegram`] wires them to
//! the Telegram Bot API.

pub mod telegram;

use std::sync::OnceLock;

use regex::Regex;

use crate::assistant::Request;
use crate::entries::types::{Priority, KEY_COMPLETED, KEY_PRIORITY_CODE, MAX_MOOD_SCORE};
use crate::store::MetadataFilter;

/// Telegram's per-message character limit.
pub const MAX_MESSAGE_LEN: usize = 4096;

pub const ERROR_REPLY: &str = "Sorry, something went wrong. Please try again.";

const CREATE_PHRASES: [&str; 3] = ["add task", "new task", "create task"];
const LIST_PHRASES: [&str; 4] = ["find task", "show task", "list task", "my task"];

/// A slash command and its argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    AddTask(String),
    CompleteTask(String),
    AddReflection(String),
    PlanDay,
    Unknown(String),
    /// Addressed as `/name@other` to a different bot in the same chat.
    OtherBot(String),
}

impl Command {
    /// Parse `/name[@bot] args`. Returns `None` for text that is not a command.
    ///
    /// With `bot_username` set, a command whose `@bot` suffix names someone
    /// else (compared case-insensitively) parses as [`Command::OtherBot`].
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Command> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let (name, addressee) = match head.split_once('@') {
            Some((name, addressee)) => (name, Some(addressee)),
            None => (head, None),
        };
        if let (Some(addressee), Some(own)) = (addressee, bot_username) {
            let own = own.trim_start_matches('@');
            if !addressee.eq_ignore_ascii_case(own) {
                return Some(Self::OtherBot(addressee.to_string()));
            }
        }
        let name = name.to_lowercase();
        let args = args.to_string();

        Some(match name.as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "add_task" => Self::AddTask(args),
            "complete_task" => Self::CompleteTask(args),
            "add_reflection" => Self::AddReflection(args),
            "plan_day" => Self::PlanDay,
            _ => Self::Unknown(name),
        })
    }

    /// The request this command maps to. Unknown commands get no reply.
    pub fn into_request(self) -> Option<Request> {
        match self {
            Self::Start => Some(Request::Start),
            Self::Help => Some(Request::Help),
            Self::AddTask(text) => Some(Request::AddTask(text)),
            Self::CompleteTask(args) => {
                let id = args.split_whitespace().next().unwrap_or("").to_string();
                Some(Request::CompleteTask(id))
            }
            Self::AddReflection(text) => {
                let mood = parse_rating(&text);
                Some(Request::AddReflection { text, mood })
            }
            Self::PlanDay => Some(Request::PlanDay),
            Self::Unknown(_) | Self::OtherBot(_) => None,
        }
    }
}

/// Route a message: commands first, then free-text intent.
pub fn route_message(text: &str, bot_username: Option<&str>) -> Option<Request> {
    match Command::parse(text, bot_username) {
        Some(command) => command.into_request(),
        None => route_free_text(text),
    }
}

/// Classify non-command text by keyword.
///
/// A creation phrase only creates a task when a priority code is present;
/// otherwise the message falls through to listing or a general question.
pub fn route_free_text(text: &str) -> Option<Request> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let lower = text.to_lowercase();

    if CREATE_PHRASES.iter().any(|p| lower.contains(p)) && Priority::detect(&lower).is_some() {
        return Some(Request::CreateTask(text.to_string()));
    }

    if LIST_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(Request::ListTasks {
            query: text.to_string(),
            filter: listing_filter(text),
        });
    }

    Some(Request::Ask(text.to_string()))
}

/// Filter implied by a listing request: a priority code and a completion state.
pub fn listing_filter(text: &str) -> MetadataFilter {
    let lower = text.to_lowercase();
    let mut filter = MetadataFilter::new();
    if let Some(priority) = Priority::detect(&lower) {
        filter.set(KEY_PRIORITY_CODE, priority.code());
    }
    if ["incomplete", "not done", "not completed"]
        .iter()
        .any(|p| lower.contains(p))
    {
        filter.set(KEY_COMPLETED, false);
    } else if lower.contains("completed") {
        filter.set(KEY_COMPLETED, true);
    }
    filter
}

fn rating_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\s*/\s*10").expect("static regex"))
}

/// Explicit `N/10` rating, clamped to the mood scale.
pub fn parse_rating(text: &str) -> Option<u8> {
    let digits = rating_pattern().captures(text)?.get(1)?.as_str();
    // Anything too long to parse is far above the scale anyway.
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    Some(value.min(u64::from(MAX_MOOD_SCORE)) as u8)
}

/// Chunks to send for `reply`. Telegram rejects empty messages, so a blank
/// reply is replaced by [`ERROR_REPLY`].
pub fn reply_chunks(reply: &str) -> Vec<String> {
    let chunks = split_message(reply, MAX_MESSAGE_LEN);
    if chunks.is_empty() {
        vec![ERROR_REPLY.to_string()]
    } else {
        chunks
    }
}

/// Split `text` into chunks of at most `max_chars` characters, preferring
/// to break after a newline. Whitespace-only chunks are dropped.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let Some((hard_end, _)) = rest.char_indices().nth(max_chars) else {
            chunks.push(rest.to_string());
            break;
        };
        let end = match rest[..hard_end].rfind('\n') {
            Some(nl) if nl > 0 => nl + 1,
            _ => hard_end,
        };
        chunks.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    chunks.retain(|c| !c.trim().is_empty());
    chunks
}
