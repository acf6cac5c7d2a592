mod helpers;

use halsey::assistant::Request;
use halsey::bot::{reply_chunks, route_message};
use halsey::generation::{EMPTY_RESPONSE_MESSAGE, UNAVAILABLE_MESSAGE};
use halsey::prompt::{self, NO_CONTEXT};
use helpers::{spawn_ollama_replying, test_assistant, unreachable_endpoint};

fn route(text: &str) -> Request {
    route_message(text, Some("HalseyBot")).unwrap_or_else(|| panic!("no request for {text:?}"))
}

fn id_from(reply: &str) -> String {
    reply
        .split("ID: ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn start_and_help() {
    let assistant = test_assistant(&unreachable_endpoint());
    assert_eq!(
        assistant.respond(route("/start")).await.unwrap(),
        prompt::START_TEXT
    );
    let help = assistant.respond(route("/help")).await.unwrap();
    assert!(help.contains("/plan_day"));
    assert!(help.contains("- Ferrari: urgent and important"));
}

#[test]
fn unknown_command_gets_no_reply() {
    assert!(route_message("/frobnicate now", Some("HalseyBot")).is_none());
    assert!(route_message("/plan_day@OtherBot", Some("HalseyBot")).is_none());
}

#[tokio::test]
async fn add_and_complete_task() {
    let assistant = test_assistant(&unreachable_endpoint());

    let reply = assistant
        .respond(route("/add_task Finish report ferrari"))
        .await
        .unwrap();
    assert!(reply.starts_with("Task stored! ID: task_"));
    assert!(reply.ends_with("Priority: urgent and important"));

    let id = id_from(&reply);
    let done = assistant
        .respond(route(&format!("/complete_task {id}")))
        .await
        .unwrap();
    assert_eq!(done, "Task marked as completed");

    let again = assistant
        .respond(route(&format!("/complete_task {id}")))
        .await
        .unwrap();
    assert_eq!(again, "Task already completed");

    let missing = assistant
        .respond(route("/complete_task task_deadbeef"))
        .await
        .unwrap();
    assert_eq!(missing, "Task not found");
}

#[tokio::test]
async fn task_without_code_has_single_line_reply() {
    let assistant = test_assistant(&unreachable_endpoint());
    let reply = assistant.respond(route("/add_task Water plants")).await.unwrap();
    assert!(reply.starts_with("Task stored! ID: task_"));
    assert!(!reply.contains('\n'));
}

#[tokio::test]
async fn empty_arguments_prompt_for_details() {
    let assistant = test_assistant(&unreachable_endpoint());
    assert_eq!(
        assistant.respond(route("/add_task")).await.unwrap(),
        "Please provide task details after /add_task."
    );
    assert_eq!(
        assistant.respond(route("/complete_task   ")).await.unwrap(),
        "Please provide task ID after /complete_task."
    );
    assert_eq!(
        assistant.respond(route("/add_reflection")).await.unwrap(),
        "Please provide reflection details after /add_reflection."
    );
}

#[tokio::test]
async fn reflection_with_rating() {
    let assistant = test_assistant(&unreachable_endpoint());
    let reply = assistant
        .respond(route("/add_reflection Good day overall 8/10"))
        .await
        .unwrap();
    assert!(reply.starts_with("Reflection stored! ID: reflection_"));
    assert!(reply.ends_with("Mood score: 8/10"));

    let clamped = assistant
        .respond(route("/add_reflection Best day ever 15/10"))
        .await
        .unwrap();
    assert!(clamped.ends_with("Mood score: 10/10"));
}

#[tokio::test]
async fn free_text_creates_and_lists_tasks() {
    let assistant = test_assistant(&unreachable_endpoint());

    let created = assistant
        .respond(route("Add task call the plumber tesla"))
        .await
        .unwrap();
    assert!(created.starts_with("Task added! ID: task_"));
    assert!(created.ends_with("Priority: semi-urgent and important"));

    assistant
        .respond(route("/add_task Finish report ferrari"))
        .await
        .unwrap();

    let listing = assistant
        .respond(route("Show tasks that are ferrari"))
        .await
        .unwrap();
    assert!(listing.starts_with("Here are your tasks:"));
    assert!(listing.contains("1. ◯ PENDING [FERRARI] Finish report ferrari"));
    assert!(!listing.contains("plumber"));
}

#[tokio::test]
async fn listing_completed_with_nothing_done() {
    let assistant = test_assistant(&unreachable_endpoint());
    assistant.add_task("Pay rent", None).await.unwrap();

    let listing = assistant
        .respond(route("list tasks completed"))
        .await
        .unwrap();
    assert_eq!(listing, "No matching tasks found.");
}

#[tokio::test]
async fn plan_day_sends_open_tasks_to_model() {
    let server = spawn_ollama_replying("09:00 Finish report").await;
    let assistant = test_assistant(&server.endpoint);

    assistant.add_task("Finish report ferrari", None).await.unwrap();
    let done = assistant.add_task("Old chore budweiser", None).await.unwrap();
    assistant.complete_task(&done.id).await.unwrap();
    assistant.add_task("Water plants", None).await.unwrap();
    assistant
        .add_reflection("Slept badly", Some(4))
        .await
        .unwrap();

    let request = route("/plan_day");
    assert!(request.interim_notice().is_some());
    let reply = assistant.respond(request).await.unwrap();
    assert_eq!(reply, "Here's your plan for today:\n\n09:00 Finish report");

    let sent = server.last_request();
    let prompt = sent["prompt"].as_str().unwrap();
    assert!(prompt.contains("FERRARI TASKS (urgent and important):"));
    assert!(prompt.contains("- Finish report ferrari (ID: task_"));
    assert!(prompt.contains("OTHER TASKS (no priority code):"));
    assert!(prompt.contains("Slept badly Mood: 4/10"));
    assert!(!prompt.contains("Old chore"));
}

#[tokio::test]
async fn answer_uses_retrieved_context() {
    let server = spawn_ollama_replying("You have one urgent task.").await;
    let assistant = test_assistant(&server.endpoint);
    assistant.add_task("Finish report ferrari", None).await.unwrap();

    let reply = assistant
        .respond(route("What is urgent today?"))
        .await
        .unwrap();
    assert_eq!(reply, "You have one urgent task.");

    let sent = server.last_request();
    let prompt = sent["prompt"].as_str().unwrap();
    assert!(prompt.starts_with("The user is asking: 'What is urgent today?'"));
    assert!(prompt.contains("Finish report ferrari"));
    assert!(!prompt.contains(NO_CONTEXT));
}

#[tokio::test]
async fn answer_without_model_explains() {
    let assistant = test_assistant(&unreachable_endpoint());
    let reply = assistant
        .respond(Request::Ask("anything?".into()))
        .await
        .unwrap();
    assert_eq!(reply, UNAVAILABLE_MESSAGE);

    let prompt = assistant.answer_prompt("anything?").await.unwrap();
    assert!(prompt.contains(NO_CONTEXT));
}

#[tokio::test]
async fn empty_model_reply_still_answers() {
    let server = spawn_ollama_replying("").await;
    let assistant = test_assistant(&server.endpoint);

    let answer = assistant
        .respond(Request::Ask("anything?".into()))
        .await
        .unwrap();
    assert_eq!(answer, EMPTY_RESPONSE_MESSAGE);

    let plan = assistant.respond(route("/plan_day")).await.unwrap();
    assert!(plan.ends_with(EMPTY_RESPONSE_MESSAGE));
    assert_eq!(reply_chunks(&plan), vec![plan.clone()]);
}

#[tokio::test]
async fn close_after_use() {
    let assistant = test_assistant(&unreachable_endpoint());
    assistant.add_task("Something", None).await.unwrap();
    assistant.close().unwrap();
}
