#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use halsey::assistant::Assistant;
use halsey::config::HalseyConfig;
use halsey::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use halsey::generation::Generator;
use halsey::store::VectorStore;

/// Deterministic bag-of-words embedder: each lowercase word bumps one of 384
/// buckets, then the vector is L2-normalized. Texts sharing words are close.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    fn bucket(word: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in word.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % EMBEDDING_DIM as u64) as usize
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            v[Self::bucket(&word.to_lowercase())] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl EmbeddingProvider for KeywordEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Fresh in-memory store with the production collection name.
pub fn test_store() -> VectorStore {
    VectorStore::open_in_memory("personal_assistant", EMBEDDING_DIM).unwrap()
}

/// Config pointing generation at `endpoint`.
pub fn test_config(endpoint: &str) -> HalseyConfig {
    let mut config = HalseyConfig::default();
    config.generation.endpoint = endpoint.to_string();
    config.generation.timeout_secs = Some(5);
    config
}

/// Assistant over an in-memory store and the keyword embedder.
pub fn test_assistant(endpoint: &str) -> Assistant {
    let config = Arc::new(test_config(endpoint));
    let generator = Generator::new(&config.generation).unwrap();
    Assistant::new(test_store(), Arc::new(KeywordEmbedder), generator, config)
}

/// An endpoint nothing listens on.
pub fn unreachable_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

#[derive(Clone)]
struct FakeState {
    status: StatusCode,
    body: Value,
    requests: Arc<Mutex<Vec<Value>>>,
}

/// A stand-in for Ollama's `/api/generate` that records request bodies.
pub struct FakeOllama {
    pub endpoint: String,
    pub requests: Arc<Mutex<Vec<Value>>>,
}

impl FakeOllama {
    pub fn last_request(&self) -> Value {
        self.requests.lock().unwrap().last().cloned().expect("no request recorded")
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn generate(State(state): State<FakeState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    state.requests.lock().unwrap().push(body);
    (state.status, Json(state.body.clone()))
}

/// Serve `body` with `status` for every generate request.
pub async fn spawn_fake_ollama(status: StatusCode, body: Value) -> FakeOllama {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = FakeState {
        status,
        body,
        requests: Arc::clone(&requests),
    };
    let app = Router::new()
        .route("/api/generate", post(generate))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeOllama {
        endpoint: format!("http://{addr}"),
        requests,
    }
}

/// Fake server answering with `{"response": text}`.
pub async fn spawn_ollama_replying(text: &str) -> FakeOllama {
    spawn_fake_ollama(StatusCode::OK, serde_json::json!({ "response": text })).await
}
