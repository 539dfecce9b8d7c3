use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::budget::approx_tokens;
use crate::config::AnalysisConfig;
use crate::error::{ClassifiedError, ProviderErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    /// Ask the backend for a JSON-only response where it supports one.
    pub json_mode: bool,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            json_mode: true,
            max_tokens: 2048,
            temperature: 0.0,
        }
    }
}

/// Anything that takes a system instruction plus a user prompt and returns free text.
#[async_trait]
pub trait ClassifierProvider: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> Result<Completion, ClassifiedError>;

    fn name(&self) -> &str;

    fn model(&self) -> &str;
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiCompatProvider {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u64>,
}

impl OpenAiCompatProvider {
    pub fn new(
        api_base: &str,
        api_key: Option<String>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ClassifiedError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ClassifiedError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ClassifierProvider for OpenAiCompatProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> Result<Completion, ClassifiedError> {
        let start = std::time::Instant::now();
        debug!(
            "LLM call starting - model={}, prompt_length={} chars",
            self.model,
            system_prompt.len() + user_prompt.len()
        );

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: options.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let kind = ProviderErrorKind::from_status(status.as_u16());
            warn!("LLM API error - status={}, class={}", status, kind.as_str());
            return Err(ClassifiedError::provider(
                kind,
                format!("{}: {}", status, body.chars().take(300).collect::<String>()),
            ));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ClassifiedError::provider(ProviderErrorKind::EmptyResponse, "no content in response")
            })?;

        let tokens_used = completion
            .usage
            .and_then(|u| u.total_tokens)
            .unwrap_or_else(|| (approx_tokens(system_prompt) + approx_tokens(user_prompt) + approx_tokens(&text)) as u64);

        let elapsed = start.elapsed();
        info!(
            "LLM API call completed - duration={:.2}s, response_length={} chars, tokens={}",
            elapsed.as_secs_f32(),
            text.len(),
            tokens_used
        );

        Ok(Completion { text, tokens_used })
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Build the configured provider. Reads the API key from the environment once.
pub fn from_config(config: &AnalysisConfig) -> Result<Arc<dyn ClassifierProvider>, ClassifiedError> {
    match config.provider.as_str() {
        "openai" | "openai_compat" => {
            let api_key = std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty());
            if api_key.is_none() {
                warn!(
                    "No API key in {} - sending unauthenticated requests to {}",
                    config.api_key_env, config.api_base
                );
            }
            let provider = OpenAiCompatProvider::new(
                &config.api_base,
                api_key,
                &config.model,
                Duration::from_secs(config.request_timeout_secs),
            )?;
            info!(
                "Classifier provider initialized - provider={}, model={}",
                provider.name(),
                provider.model()
            );
            Ok(Arc::new(provider))
        }
        other => Err(ClassifiedError::Config(format!(
            "unknown provider '{}', expected 'openai'",
            other
        ))),
    }
}
