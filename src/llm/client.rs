//! Chat-completions client for OpenAI-compatible and Azure OpenAI endpoints.
//!
//! The client is built from an explicit [`LlmConfig`] rather than process-wide
//! state, so the synthesis stage receives it at construction time and tests
//! can substitute any other [`LlmProvider`].

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Default model (or Azure deployment) name.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Base delay for exponential backoff in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (e.g., "system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request for text generation from an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier; empty means the provider's default.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 2.0). Lower values are more deterministic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Create a new generation request with default parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the temperature for this request.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max tokens for this request.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Response from an LLM generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Unique identifier for this response.
    pub id: String,
    /// Model that generated this response.
    pub model: String,
    /// Generated choices/completions.
    pub choices: Vec<Choice>,
    /// Token usage statistics.
    pub usage: Usage,
}

impl GenerationResponse {
    /// Get the content of the first choice, if available.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// A single generated choice from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice in the response.
    pub index: u32,
    /// Generated message.
    pub message: Message,
    /// Reason the generation stopped (e.g., "stop", "length").
    pub finish_reason: String,
}

/// Token usage statistics for a generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,
    /// Number of tokens generated.
    pub completion_tokens: u32,
    /// Total tokens used.
    pub total_tokens: u32,
}

/// Trait for LLM providers that can generate text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Endpoint layout and authentication scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    /// `{api_base}/chat/completions` with a bearer token.
    OpenAi,
    /// `{api_base}/openai/deployments/{model}/chat/completions?api-version=..`
    /// with an `api-key` header.
    Azure,
}

/// Connection settings for [`ChatClient`].
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub flavor: ApiFlavor,
    /// Base URL (OpenAI-compatible) or resource endpoint (Azure).
    pub api_base: String,
    pub api_key: Option<String>,
    /// Required for Azure.
    pub api_version: Option<String>,
    /// Model name, or deployment name for Azure.
    pub model: String,
    pub timeout: Duration,
    /// Extra attempts after a transient failure.
    pub max_retries: u32,
}

impl LlmConfig {
    /// OpenAI-compatible endpoint with defaults.
    pub fn openai(api_base: impl Into<String>) -> Self {
        Self {
            flavor: ApiFlavor::OpenAi,
            api_base: api_base.into(),
            api_key: None,
            api_version: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            max_retries: 2,
        }
    }

    /// Azure OpenAI resource endpoint with defaults.
    pub fn azure(endpoint: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            flavor: ApiFlavor::Azure,
            api_version: Some(api_version.into()),
            ..Self::openai(endpoint)
        }
    }

    /// Reads the configuration from the environment.
    ///
    /// - `AZURE_ENDPOINT`: selects the Azure flavor when set
    /// - `LLM_API_BASE`: OpenAI-compatible base URL (used when `AZURE_ENDPOINT` is unset)
    /// - `LLM_API_KEY` or `API_KEY`: API key
    /// - `LLM_API_VERSION` or `API_VERSION`: Azure API version (required for Azure)
    /// - `LLM_MODEL`: model or deployment name (default: gpt-4o)
    /// - `LLM_TIMEOUT_SECS`: request timeout (default: 120)
    /// - `LLM_MAX_RETRIES`: retries after transient failures (default: 2)
    pub fn from_env() -> Result<Self, LlmError> {
        let api_version = env::var("LLM_API_VERSION")
            .or_else(|_| env::var("API_VERSION"))
            .ok();

        let mut config = if let Ok(endpoint) = env::var("AZURE_ENDPOINT") {
            let version = api_version.ok_or(LlmError::MissingApiVersion)?;
            Self::azure(endpoint, version)
        } else {
            let base = env::var("LLM_API_BASE").map_err(|_| LlmError::MissingApiBase)?;
            Self {
                api_version,
                ..Self::openai(base)
            }
        };

        config.api_key = env::var("LLM_API_KEY").or_else(|_| env::var("API_KEY")).ok();
        if let Ok(model) = env::var("LLM_MODEL") {
            config.model = model;
        }
        if let Some(secs) = env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env::var("LLM_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            config.max_retries = retries;
        }
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Full chat-completions URL for `model`.
    pub fn completions_url(&self, model: &str) -> Result<String, LlmError> {
        let base = self.api_base.trim_end_matches('/');
        match self.flavor {
            ApiFlavor::OpenAi => Ok(format!("{}/chat/completions", base)),
            ApiFlavor::Azure => {
                let version = self
                    .api_version
                    .as_deref()
                    .ok_or(LlmError::MissingApiVersion)?;
                Ok(format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    base, model, version
                ))
            }
        }
    }
}

/// HTTP client for chat-completions endpoints.
pub struct ChatClient {
    config: LlmConfig,
    http_client: Client,
}

impl ChatClient {
    /// Create a client from explicit configuration.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Create a client from environment variables (see [`LlmConfig::from_env`]).
    pub fn from_env() -> Result<Self, LlmError> {
        Self::new(LlmConfig::from_env()?)
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Check if an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Execute a request with exponential backoff retry logic.
    async fn execute_with_retry(
        &self,
        url: &str,
        request: &ApiRequest,
    ) -> Result<GenerationResponse, LlmError> {
        let mut attempt = 0;
        loop {
            match self.execute_request(url, request).await {
                Ok(response) => return Ok(response),
                Err(err) if is_transient_error(&err) && attempt < self.config.max_retries => {
                    // Exponential backoff: 1s, 2s, 4s, ...
                    let delay_ms = BASE_RETRY_DELAY_MS * (1 << attempt.min(6));
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay_ms,
                        error = %err,
                        "Transient LLM error, will retry"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Execute a single request (no retry logic).
    async fn execute_request(
        &self,
        url: &str,
        request: &ApiRequest,
    ) -> Result<GenerationResponse, LlmError> {
        let mut http_request = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json");

        if let Some(ref api_key) = self.config.api_key {
            http_request = match self.config.flavor {
                ApiFlavor::OpenAi => {
                    http_request.header("Authorization", format!("Bearer {}", api_key))
                }
                ApiFlavor::Azure => http_request.header("api-key", api_key),
            };
        }

        let http_response = http_request
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            let message = serde_json::from_str::<ApiErrorResponse>(&error_text)
                .map(|r| r.error.message)
                .unwrap_or(error_text);

            if status_code == 429 {
                return Err(LlmError::RateLimited(message));
            }
            return Err(LlmError::ApiError {
                code: status_code,
                message,
            });
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        Ok(api_response.into_generation_response())
    }
}

/// Internal request structure for the chat-completions API.
#[derive(Debug, Serialize)]
struct ApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Internal response structure from the chat-completions API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl ApiResponse {
    fn into_generation_response(self) -> GenerationResponse {
        let choices = self
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: Message {
                    role: choice.message.role,
                    content: choice.message.content.unwrap_or_default(),
                },
                finish_reason: choice.finish_reason.unwrap_or_default(),
            })
            .collect();

        GenerationResponse {
            id: self.id,
            model: self.model,
            choices,
            usage: self.usage.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    index: u32,
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Whether `error` is worth retrying.
fn is_transient_error(error: &LlmError) -> bool {
    match error {
        LlmError::RequestFailed(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("timeout") || msg.contains("timed out") || msg.contains("connection")
        }
        LlmError::RateLimited(_) => true,
        LlmError::ApiError { code, .. } => *code >= 500 || *code == 429,
        _ => false,
    }
}

#[async_trait]
impl LlmProvider for ChatClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let model = if request.model.is_empty() {
            self.config.model.clone()
        } else {
            request.model
        };
        let url = self.config.completions_url(&model)?;

        let api_request = ApiRequest {
            // Azure routes by deployment in the URL
            model: match self.config.flavor {
                ApiFlavor::OpenAi => Some(model.clone()),
                ApiFlavor::Azure => None,
            },
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        tracing::debug!(model = %model, url = %url, "Sending chat-completions request");
        self.execute_with_retry(&url, &api_request).await
    }
}
