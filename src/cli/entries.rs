//! Local entry commands: the chat actions without Telegram.

use anyhow::Result;

use halsey::assistant::{format_task_list, Assistant};
use halsey::bot;
use halsey::entries::Priority;

pub async fn task_add(assistant: &Assistant, text: &str, priority: Option<Priority>) -> Result<()> {
    let added = assistant.add_task(text, priority).await?;
    println!("Task stored! ID: {}", added.id);
    match added.priority() {
        Some(p) => println!("Priority: {} ({})", p.code(), p.description()),
        None => println!("Priority: Not specified"),
    }
    Ok(())
}

pub async fn task_complete(assistant: &Assistant, id: &str) -> Result<()> {
    let outcome = assistant.complete_task(id).await?;
    println!("{outcome}");
    Ok(())
}

/// List tasks matching `query`, using the same keyword filters as chat.
pub async fn task_list(assistant: &Assistant, query: &str) -> Result<()> {
    let filter = bot::listing_filter(query);
    let matches = assistant.find_tasks(query, Some(filter)).await?;
    print!("{}", format_task_list(&matches));
    if matches.is_empty() {
        println!();
    }
    Ok(())
}

pub async fn reflect(assistant: &Assistant, text: &str, mood: Option<u8>) -> Result<()> {
    let mood = mood.or_else(|| bot::parse_rating(text));
    let added = assistant.add_reflection(text, mood).await?;
    println!("Reflection stored! ID: {}", added.id);
    if let Some(score) = added.mood_score() {
        println!("Mood score: {score}/10");
    }
    Ok(())
}

pub async fn plan(assistant: &Assistant, prompt_only: bool) -> Result<()> {
    if prompt_only {
        println!("{}", assistant.plan_prompt().await?);
        return Ok(());
    }
    eprintln!("{}", halsey::assistant::PLAN_NOTICE);
    println!("{}", assistant.plan_day().await?);
    Ok(())
}

pub async fn ask(assistant: &Assistant, query: &str, prompt_only: bool) -> Result<()> {
    if prompt_only {
        println!("{}", assistant.answer_prompt(query).await?);
        return Ok(());
    }
    println!("{}", assistant.answer(query).await?);
    Ok(())
}
