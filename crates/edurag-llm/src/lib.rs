//! Client for the Ollama `/api/generate` endpoint.
//!
//! One blocking, non-streaming request per prompt. Connect failures and
//! timeouts are retried with exponential backoff; any HTTP response is final.

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use edurag_core::config::GenerationConfig;
use edurag_core::traits::AnswerGenerator;
use edurag_core::types::Generation;

#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

pub struct OllamaGenerator {
    client: Client,
    endpoint: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub fn endpoint(&self) -> &str { &self.endpoint }

    fn send(&self, request: &GenerateRequest<'_>) -> Result<Response> {
        let mut attempt = 0u32;
        loop {
            match self.client.post(&self.endpoint).json(request).send() {
                Ok(resp) => return Ok(resp),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries => {
                    let delay = self.retry_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(endpoint = %self.endpoint, attempt, delay_ms = delay.as_millis() as u64, error = %e, "generation request failed, retrying");
                    std::thread::sleep(delay);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("POST {} failed after {} attempt(s)", self.endpoint, attempt + 1));
                }
            }
        }
    }
}

impl AnswerGenerator for OllamaGenerator {
    fn generate(&self, prompt: &str, model: &str) -> Result<Generation> {
        let request = GenerateRequest { model, prompt, stream: false };
        let resp = self.send(&request)?;
        let status = resp.status();
        let body = resp.text().context("reading generation response body")?;
        debug!(status = status.as_u16(), bytes = body.len(), "generation response");
        if status != StatusCode::OK {
            return Ok(Generation::ServiceError { status: status.as_u16(), body });
        }
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .with_context(|| format!("unexpected generation response: {}", body))?;
        Ok(Generation::Text(parsed.response))
    }
}
