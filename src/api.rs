//! LLM API interaction with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait for sending a [`ChatPrompt`] and getting text back
//! - [`ChatClient`]: HTTP implementation for OpenAI-compatible and Ollama endpoints
//! - [`RetryAsk`]: decorator that adds retry logic to any `AskAsync` implementation
//! - [`ask_with_backoff`]: entry point used by the classifier and extractor
//!
//! # Retry Strategy
//!
//! - `max_retries` attempts after the first failure (from config)
//! - Exponential backoff starting at `retry_delay_seconds`
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::{ApiFlavor, LlmSettings};
use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Errors from talking to the model endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM response had no message content")]
    EmptyResponse,

    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),
}

/// A system message plus the user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

/// Trait for async LLM interaction.
///
/// Implementors send a prompt to a model and return its text reply. Fakes of
/// this trait drive the classifier and extractor in tests.
pub trait AskAsync {
    async fn ask(&self, prompt: &ChatPrompt) -> Result<String, LlmError>;
}

impl<T: AskAsync> AskAsync for &T {
    async fn ask(&self, prompt: &ChatPrompt) -> Result<String, LlmError> {
        (**self).ask(prompt).await
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, prompt: &ChatPrompt) -> Result<String, LlmError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(prompt).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = self.backoff(attempt) + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: ResponseMessage,
}

/// HTTP client for the configured provider.
pub struct ChatClient {
    settings: LlmSettings,
    api_key: Option<String>,
    http: Client,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("api", &self.settings.api)
            .field("model", &self.settings.model)
            .field("base_url", &self.settings.base_url)
            .finish()
    }
}

impl ChatClient {
    /// Build a client, reading the API key from the environment when configured.
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let api_key = match &settings.api_key_env {
            Some(var) => Some(
                std::env::var(var)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| LlmError::MissingApiKey(var.clone()))?,
            ),
            None => None,
        };
        let http = Client::builder()
            .timeout(StdDuration::from_secs(settings.timeout_seconds))
            .build()?;
        info!(api = ?settings.api, model = %settings.model, "LLM client ready");
        Ok(Self {
            settings: settings.clone(),
            api_key,
            http,
        })
    }

    fn endpoint(&self) -> String {
        match self.settings.api {
            ApiFlavor::OpenAi => self.settings.base_url.clone(),
            ApiFlavor::Ollama => format!("{}/api/chat", self.settings.base_url.trim_end_matches('/')),
        }
    }

    async fn post<B: Serialize>(&self, body: &B) -> Result<reqwest::Response, LlmError> {
        let mut request = self.http.post(self.endpoint()).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: crate::utils::truncate_for_log(&body, 300),
            });
        }
        Ok(response)
    }
}

impl AskAsync for ChatClient {
    #[instrument(level = "debug", skip_all, fields(model = %self.settings.model))]
    async fn ask(&self, prompt: &ChatPrompt) -> Result<String, LlmError> {
        let t0 = Instant::now();
        let messages = [
            Message {
                role: "system",
                content: &prompt.system,
            },
            Message {
                role: "user",
                content: &prompt.user,
            },
        ];
        let content = match self.settings.api {
            ApiFlavor::OpenAi => {
                let body = OpenAiRequest {
                    model: &self.settings.model,
                    messages,
                    temperature: self.settings.temperature,
                    max_tokens: self.settings.max_tokens,
                };
                let parsed: OpenAiResponse = self.post(&body).await?.json().await?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
            }
            ApiFlavor::Ollama => {
                let body = OllamaRequest {
                    model: &self.settings.model,
                    messages,
                    stream: false,
                    options: OllamaOptions {
                        temperature: self.settings.temperature,
                        num_predict: self.settings.max_tokens,
                    },
                };
                let parsed: OllamaResponse = self.post(&body).await?.json().await?;
                parsed.message.content
            }
        };
        let content = content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyResponse)?;
        debug!(elapsed_ms = t0.elapsed().as_millis() as u64, bytes = content.len(), "LLM replied");
        Ok(content)
    }
}

/// Wrap a client with the retry policy from its settings.
pub fn with_retries<T: AskAsync>(inner: T, settings: &LlmSettings) -> RetryAsk<T> {
    let base = StdDuration::from_secs_f64(settings.retry_delay_seconds.max(0.0));
    RetryAsk::new(inner, settings.max_retries, base)
}

/// Send one prompt through `client` and log the total time spent, retries included.
///
/// `client` is normally the [`RetryAsk`] built by [`with_retries`].
pub async fn ask_with_backoff<C: AskAsync>(client: &C, prompt: &ChatPrompt) -> Result<String, LlmError> {
    let t0 = Instant::now();
    let res = client.ask(prompt).await;
    let dt = t0.elapsed();

    match &res {
        Ok(reply) => debug!(
            elapsed_ms_total = dt.as_millis() as u64,
            bytes = reply.len(),
            "ask_with_backoff succeeded"
        ),
        Err(e) => error!(elapsed_ms_total = dt.as_millis() as u64, error = %e, "ask_with_backoff failed"),
    }
    res
}
