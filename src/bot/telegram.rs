//! Telegram transport: long polling via teloxide.

use teloxide::prelude::*;
use tracing::{info, warn};

use super::{reply_chunks, route_message, ERROR_REPLY};
use crate::assistant::Assistant;

/// Poll Telegram until Ctrl-C, answering each text message.
pub async fn run(token: &str, assistant: Assistant) -> anyhow::Result<()> {
    let bot = Bot::new(token);
    let me = bot.get_me().await?;
    let username = me.username().to_string();
    info!(username = %username, "connected to Telegram");

    let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let assistant = assistant.clone();
        let username = username.clone();
        async move { handle_message(bot, msg, assistant, &username).await }
    });

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Telegram dispatcher stopped");
    Ok(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    assistant: Assistant,
    username: &str,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(request) = route_message(text, Some(username)) else {
        return Ok(());
    };

    let chat_id = msg.chat.id;
    info!(chat = chat_id.0, request = request.kind(), "message received");

    if let Some(notice) = request.interim_notice() {
        bot.send_message(chat_id, notice).await?;
    }

    let reply = match assistant.respond(request).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(chat = chat_id.0, error = %format!("{e:#}"), "request failed");
            ERROR_REPLY.to_string()
        }
    };

    if reply.trim().is_empty() {
        warn!(chat = chat_id.0, "empty reply replaced");
    }
    for chunk in reply_chunks(&reply) {
        bot.send_message(chat_id, chunk).await?;
    }
    Ok(())
}
