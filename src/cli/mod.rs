//! Subcommand implementations for the `halsey` binary.

pub mod doctor;
pub mod entries;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;

use halsey::assistant::Assistant;
use halsey::config::{EmbeddingConfig, HalseyConfig};
use halsey::embedding::{self, local, EmbeddingProvider};
use halsey::generation::Generator;
use halsey::store::VectorStore;

const HF_BASE: &str = "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main";

/// Files fetched by `halsey model download`: (remote path, local name, size hint).
const MODEL_FILES: [(&str, &str, &str); 2] = [
    ("onnx/model.onnx", local::MODEL_FILE, "~90MB"),
    ("tokenizer.json", local::TOKENIZER_FILE, "~700KB"),
];

/// Download the ONNX embedding model and tokenizer into the cache directory.
/// Files already present are left alone.
pub async fn model_download(config: &EmbeddingConfig) -> Result<()> {
    let (model_path, _) = local::model_paths(config);
    let cache_dir = model_path
        .parent()
        .context("model path has no parent directory")?
        .to_path_buf();
    tokio::fs::create_dir_all(&cache_dir)
        .await
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    for (remote, name, size) in MODEL_FILES {
        let dest = cache_dir.join(name);
        if dest.exists() {
            println!("{name} already exists at {}", dest.display());
            continue;
        }
        println!("Downloading {name} ({size})...");
        download_file(&format!("{HF_BASE}/{remote}"), &dest).await?;
        println!("Saved to {}", dest.display());
    }

    println!("Model download complete. Ready for use.");
    Ok(())
}

/// Stream `url` into `dest` with a progress bar, via a temp file and rename.
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download of {url} failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.green/white} {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("=> "),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("error writing {}", tmp_path.display()))?;
        pb.inc(chunk.len() as u64);
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .with_context(|| format!("failed to move download into {}", dest.display()))?;

    pb.finish_and_clear();
    Ok(())
}

/// Open the store configured in `config` for a given embedding width.
pub fn open_store(config: &HalseyConfig, dimensions: usize) -> Result<VectorStore> {
    let db_path = config.resolved_db_path();
    let store = VectorStore::open(&db_path, &config.storage.collection, dimensions)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?
        .with_filter_mode(config.retrieval.filter_mode);
    Ok(store)
}

/// Load the embedding model, open the store and build the generation client.
pub fn build_assistant(config: Arc<HalseyConfig>) -> Result<Assistant> {
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    let store = open_store(&config, embedder.dimensions())?;
    if let Some(stored) = store.record_embedding_model(embedder.model_name())? {
        tracing::warn!(
            stored = %stored,
            configured = embedder.model_name(),
            "store was built with a different embedding model; similarity results may be poor"
        );
    }
    let generator = Generator::new(&config.generation).context("failed to build HTTP client")?;
    Ok(Assistant::new(store, embedder, generator, config))
}
