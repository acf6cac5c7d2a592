mod cli;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use halsey::config::HalseyConfig;
use halsey::entries::Priority;

#[derive(Parser)]
#[command(name = "halsey", version, about = "Personal task and reflection assistant")]
struct Cli {
    /// Config file (default: ~/.halsey/config.toml)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run startup checks, then serve the Telegram bot
    Serve,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Check database, model files and the generation endpoint
    Doctor,
    /// Add, complete or list tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Store a reflection
    Reflect {
        text: String,
        /// Mood score 0-10; otherwise parsed from an "N/10" in the text
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=10))]
        mood: Option<u8>,
    },
    /// Generate a plan for today from open tasks
    Plan {
        /// Print the prompt instead of calling the model
        #[arg(long)]
        prompt_only: bool,
    },
    /// Ask a question answered from stored tasks and reflections
    Ask {
        query: String,
        /// Print the prompt instead of calling the model
        #[arg(long)]
        prompt_only: bool,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.halsey/models/
    Download,
}

#[derive(Subcommand)]
enum TaskAction {
    /// Store a task; a priority code in the text is detected automatically
    Add {
        text: String,
        /// ferrari, tesla, amazon, suzuki, orange, budweiser or greyhound
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// Mark a task completed
    Complete { id: String },
    /// Search tasks ("ferrari", "incomplete", free text)
    List {
        #[arg(default_value = "tasks")]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => HalseyConfig::load_from(path)?,
        None => HalseyConfig::load()?,
    };

    // Logs go to stderr; stdout carries command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Arc::new(config);

    match cli.command {
        Command::Serve => cli::serve::serve(config).await?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
        Command::Doctor => cli::doctor::doctor(&config).await?,
        Command::Task { action } => {
            let assistant = cli::build_assistant(config)?;
            match action {
                TaskAction::Add { text, priority } => {
                    cli::entries::task_add(&assistant, &text, priority).await?
                }
                TaskAction::Complete { id } => cli::entries::task_complete(&assistant, &id).await?,
                TaskAction::List { query } => cli::entries::task_list(&assistant, &query).await?,
            }
            assistant.close()?;
        }
        Command::Reflect { text, mood } => {
            let assistant = cli::build_assistant(config)?;
            cli::entries::reflect(&assistant, &text, mood).await?;
            assistant.close()?;
        }
        Command::Plan { prompt_only } => {
            let assistant = cli::build_assistant(config)?;
            cli::entries::plan(&assistant, prompt_only).await?;
            assistant.close()?;
        }
        Command::Ask { query, prompt_only } => {
            let assistant = cli::build_assistant(config)?;
            cli::entries::ask(&assistant, &query, prompt_only).await?;
            assistant.close()?;
        }
    }

    Ok(())
}
