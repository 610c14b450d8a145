use std::time::Duration;

use dulai_core::ApiKey;
use engine_logging::{engine_debug, engine_warn};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;

use crate::EngineError;

pub const API_KEYS_URL: &str = "https://platform.openai.com/account/api-keys";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("Please provide your OpenAI API key. You can get one at {API_KEYS_URL}")]
    Missing,
    #[error("The API key provided is incorrect. You can find your API key at {API_KEYS_URL}.")]
    Incorrect,
    #[error("An error occurred: {0}")]
    Probe(String),
}

/// Checks a client-supplied credential before any work starts.
#[async_trait::async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, api_key: &ApiKey) -> Result<(), CredentialError>;
}

/// Lists models with the key; any 2xx reply proves the key works.
#[derive(Debug, Clone)]
pub struct OpenAiCredentialProbe {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiCredentialProbe {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| EngineError::Configuration(format!("http client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl CredentialVerifier for OpenAiCredentialProbe {
    async fn verify(&self, api_key: &ApiKey) -> Result<(), CredentialError> {
        if api_key.is_empty() {
            return Err(CredentialError::Missing);
        }
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", api_key.expose()))
            .send()
            .await
            .map_err(|err| CredentialError::Probe(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            engine_debug!("credential_ok");
            return Ok(());
        }
        engine_warn!("credential_rejected status={}", status.as_u16());
        if status == StatusCode::UNAUTHORIZED {
            return Err(CredentialError::Incorrect);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CredentialError::Probe(format!("http {status}: {body}")))
    }
}
