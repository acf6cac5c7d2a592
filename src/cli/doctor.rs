//! `halsey doctor`: database, model and endpoint diagnostics.

use anyhow::{Context, Result};

use halsey::config::HalseyConfig;
use halsey::db;
use halsey::embedding::{local, EMBEDDING_DIM};
use halsey::preflight;
use halsey::store::VectorStore;

pub async fn doctor(config: &HalseyConfig) -> Result<()> {
    println!("Halsey Health Report");
    println!("====================");
    println!();

    database_section(config)?;
    println!();
    model_section(config);
    println!();
    services_section(config).await;
    Ok(())
}

fn database_section(config: &HalseyConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    if !db_path.exists() {
        println!("Database:          not found at {}", db_path.display());
        println!("                   It is created on first `halsey serve` or `halsey task add`.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let conn = db::open_database(&db_path, EMBEDDING_DIM)
        .context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!(
        "Embedding model:   {} (configured: {})",
        report.embedding_model.as_deref().unwrap_or("(not set)"),
        config.embedding.model
    );
    if let Some(dim) = report.embedding_dim {
        println!("Embedding dim:     {dim}");
    }
    println!("Entries:           {}", report.entry_count);
    println!("Vectors:           {}", report.vector_count);
    if report.entry_count != report.vector_count {
        println!("  WARNING: entry and vector counts differ.");
    }

    let dimensions = report.embedding_dim.unwrap_or(EMBEDDING_DIM);
    match VectorStore::from_connection(conn, &config.storage.collection, dimensions) {
        Ok(store) => {
            println!("Collection:        {}", store.collection());
            for (kind, count) in store.count_by_type()? {
                println!("  {kind:<16} {count}");
            }
        }
        Err(e) => println!("Collection:        unavailable ({e})"),
    }

    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!("  Restore from a backup of {}.", db_path.display());
    }
    Ok(())
}

fn model_section(config: &HalseyConfig) {
    let (model_path, tokenizer_path) = local::model_paths(&config.embedding);
    let mut missing = false;
    for (label, path) in [("ONNX model:", model_path), ("Tokenizer:", tokenizer_path)] {
        let state = if path.exists() {
            "present"
        } else {
            missing = true;
            "MISSING"
        };
        println!("{label:<18} {state} ({})", path.display());
    }
    if missing {
        println!("  Run `halsey model download`.");
    }
}

async fn services_section(config: &HalseyConfig) {
    match preflight::check_endpoint(&config.generation.endpoint).await {
        Ok(()) => println!(
            "Ollama:            reachable at {} (model {})",
            config.generation.endpoint, config.generation.model
        ),
        Err(e) => {
            println!("Ollama:            {e}");
            println!("  {}", e.remediation(config).replace('\n', "\n  "));
        }
    }

    match preflight::check_token(config) {
        Ok(_) => println!("Telegram token:    set"),
        Err(_) => println!("Telegram token:    not set (required for `halsey serve`)"),
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}
