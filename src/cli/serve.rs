//! `halsey serve`: preflight checks, then the Telegram bot.

use std::sync::Arc;

use anyhow::Result;

use halsey::bot::telegram;
use halsey::config::HalseyConfig;
use halsey::preflight::{self, SetupError};

/// Run every startup check and the bot. Setup failures print their
/// remediation and exit non-zero.
pub async fn serve(config: Arc<HalseyConfig>) -> Result<()> {
    println!("{}", "=".repeat(50));
    println!("Starting Halsey - personal task assistant");
    println!("{}", "=".repeat(50));

    let token = match preflight::check_token(&config) {
        Ok(token) => token.to_string(),
        Err(e) => fail(&config, e),
    };
    if let Err(e) = preflight::check_endpoint(&config.generation.endpoint).await {
        fail(&config, e);
    }

    println!("Setting up database...");
    let assistant = match super::build_assistant(Arc::clone(&config)) {
        Ok(assistant) => assistant,
        Err(e) => fail(&config, SetupError::Database(e)),
    };
    println!(
        "Database ready with collection: {}",
        config.storage.collection
    );

    println!("Testing connection to {}...", config.generation.model);
    match preflight::smoke_test(assistant.generator(), &config).await {
        Ok(reply) => {
            let preview: String = reply.chars().take(50).collect();
            println!("Model response: {preview}...");
        }
        Err(e) => fail(&config, e),
    }

    println!();
    println!("All systems ready! Starting Telegram bot (Ctrl-C to stop)...");
    telegram::run(&token, assistant.clone()).await?;

    // Dispatcher workers may still hold a clone; the connection then closes on drop.
    if let Err(e) = assistant.close() {
        tracing::warn!(error = %e, "store not closed explicitly");
    }
    Ok(())
}

fn fail(config: &HalseyConfig, error: SetupError) -> ! {
    tracing::error!(error = %error, "setup check failed");
    eprintln!("{error}");
    eprintln!("{}", error.remediation(config));
    eprintln!();
    eprintln!("Setup checks failed. Please fix the issues above and try again.");
    std::process::exit(1);
}
