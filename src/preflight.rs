//! Startup checks for `halsey serve`.
//!
//! Each check fails with a [`SetupError`] whose [`SetupError::remediation`]
//! tells the user what to run.

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::HalseyConfig;
use crate::generation::{GenerationError, GenerationOptions, Generator};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const SMOKE_PROMPT: &str = "Hello, are you working?";
const SMOKE_MAX_TOKENS: u32 = 10;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("TELEGRAM_TOKEN environment variable not set")]
    MissingToken,

    #[error("generation endpoint is not a usable URL: {0}")]
    InvalidEndpoint(String),

    #[error("Ollama doesn't appear to be running on {address}")]
    EndpointUnreachable { address: String },

    #[error("database setup failed: {0:#}")]
    Database(anyhow::Error),

    #[error("error connecting to the generation model: {0}")]
    SmokeTest(#[source] GenerationError),
}

impl SetupError {
    /// What the user should do about it.
    pub fn remediation(&self, config: &HalseyConfig) -> String {
        match self {
            Self::MissingToken => "Please set it with:\n  \
                 - Linux/Mac: export TELEGRAM_TOKEN='your_token_here'\n  \
                 - Windows: set TELEGRAM_TOKEN=your_token_here"
                .to_string(),
            Self::InvalidEndpoint(_) => {
                "Set [generation] endpoint in ~/.halsey/config.toml or HALSEY_OLLAMA_URL, \
                 e.g. http://localhost:11434"
                    .to_string()
            }
            Self::EndpointUnreachable { .. } | Self::SmokeTest(_) => format!(
                "Please start Ollama with:\n  ollama run {}",
                config.generation.model
            ),
            Self::Database(_) => format!(
                "Check that {} is writable, or run `halsey doctor`.",
                config.resolved_db_path().display()
            ),
        }
    }
}

/// The configured bot token, or [`SetupError::MissingToken`].
pub fn check_token(config: &HalseyConfig) -> Result<&str, SetupError> {
    config.telegram_token().ok_or(SetupError::MissingToken)
}

/// `host:port` of an HTTP endpoint, defaulting the port from the scheme.
pub fn endpoint_address(endpoint: &str) -> Result<String, SetupError> {
    let url = reqwest::Url::parse(endpoint)
        .map_err(|e| SetupError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| SetupError::InvalidEndpoint(format!("{endpoint}: no host")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| SetupError::InvalidEndpoint(format!("{endpoint}: no port")))?;
    Ok(format!("{host}:{port}"))
}

/// Open and close a TCP connection to the generation endpoint.
pub async fn check_endpoint(endpoint: &str) -> Result<(), SetupError> {
    let address = endpoint_address(endpoint)?;
    match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&address)).await {
        Ok(Ok(_stream)) => {
            tracing::debug!(%address, "generation endpoint reachable");
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::debug!(%address, error = %e, "connect failed");
            Err(SetupError::EndpointUnreachable { address })
        }
        Err(_) => Err(SetupError::EndpointUnreachable { address }),
    }
}

/// Ask the model for a few tokens and return what it said.
pub async fn smoke_test(generator: &Generator, config: &HalseyConfig) -> Result<String, SetupError> {
    let options = GenerationOptions {
        max_tokens: SMOKE_MAX_TOKENS,
        temperature: config.generation.temperature,
    };
    generator
        .generate(SMOKE_PROMPT, &options)
        .await
        .map_err(SetupError::SmokeTest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_from_endpoint() {
        assert_eq!(
            endpoint_address("http://localhost:11434").unwrap(),
            "localhost:11434"
        );
        assert_eq!(endpoint_address("https://ollama.lan/").unwrap(), "ollama.lan:443");
        assert!(matches!(
            endpoint_address("not a url"),
            Err(SetupError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn missing_token_remediation() {
        let mut config = HalseyConfig::default();
        config.telegram.token = None;
        let err = check_token(&config).unwrap_err();
        assert!(err.remediation(&config).contains("export TELEGRAM_TOKEN="));
    }

    #[test]
    fn unreachable_remediation_names_model() {
        let config = HalseyConfig::default();
        let err = SetupError::EndpointUnreachable {
            address: "localhost:11434".into(),
        };
        assert!(err.remediation(&config).contains("ollama run gemma3:1b"));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = check_endpoint(&format!("http://127.0.0.1:{port}"))
            .await
            .unwrap_err();
        assert!(matches!(err, SetupError::EndpointUnreachable { .. }));
    }

    #[tokio::test]
    async fn open_port_is_reachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        check_endpoint(&format!("http://127.0.0.1:{port}")).await.unwrap();
    }
}
