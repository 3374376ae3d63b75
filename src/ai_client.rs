//! Generative AI client with bounded exponential-backoff retry.
//!
//! Text and image generation both go through a single `generateContent` call
//! wrapped in [`retry_with_backoff`]. The HTTP layer sits behind
//! [`GenerativeTransport`] so the retry and response validation logic does not
//! depend on a live endpoint.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ai_errors::AiError;
use crate::config::{AiConfig, RetryConfig};

/// Request body for `generateContent`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestContent {
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestPart {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
}

impl GenerateContentRequest {
    /// Low-temperature text request; accuracy over creativity
    pub fn text(prompt: &str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: Some(0.1),
                top_p: Some(0.8),
                top_k: Some(40),
                response_modalities: None,
            },
        }
    }

    /// Image-only request
    pub fn image(prompt: &str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string()]),
                ..GenerationConfig::default()
            },
        }
    }
}

/// Response body from `generateContent`
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<ResponseContent>,
    #[serde(rename = "finishReason", default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "inlineData", default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct InlineData {
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    /// Base64-encoded bytes
    #[serde(default)]
    pub data: Option<String>,
}

impl GenerateContentResponse {
    /// Parts of the first candidate, or the matching shape error
    fn first_parts(&self) -> Result<&[ResponsePart], AiError> {
        let candidate = self.candidates.first().ok_or(AiError::EmptyResponse)?;
        match &candidate.content {
            Some(content) if !content.parts.is_empty() => Ok(&content.parts),
            _ => Err(AiError::EmptyContent),
        }
    }

    /// Text of the first part of the first candidate
    pub fn text(&self) -> Result<&str, AiError> {
        let parts = self.first_parts()?;
        parts[0].text.as_deref().ok_or(AiError::EmptyContent)
    }

    /// Base64 image payload of the first candidate.
    ///
    /// Image models may prepend a text part, so the first part carrying
    /// inline data is used.
    pub fn image_data(&self) -> Result<&str, AiError> {
        let parts = self.first_parts()?;
        parts
            .iter()
            .filter_map(|part| part.inline_data.as_ref())
            .find_map(|inline| inline.data.as_deref().filter(|data| !data.is_empty()))
            .ok_or(AiError::NoImageData)
    }
}

/// One `generateContent` round trip, without retry
#[async_trait]
pub trait GenerativeTransport: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AiError>;
}

/// reqwest-backed transport for the Gemini REST API
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    api_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("cocktail-catalog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl GenerativeTransport for HttpTransport {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AiError> {
        let url = format!("{}/{}:generateContent", self.api_url, model);

        let res = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(
                model,
                status = status.as_u16(),
                body = %body,
                "Generative AI returned an error response"
            );
            return Err(AiError::from_status(status.as_u16()));
        }

        res.json::<GenerateContentResponse>()
            .await
            .map_err(|e| AiError::InvalidBody(e.to_string()))
    }
}

/// Run `call` until it succeeds, fails with a non-retryable error, or the
/// attempt budget (`max_retries + 1`) is spent. Returns the last error.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    call: F,
) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let retries = AtomicU32::new(0);

    let result = call
        .retry(config.backoff())
        .when(AiError::is_retryable)
        .notify(|e: &AiError, dur: Duration| {
            let attempt = retries.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                operation,
                attempt,
                total = config.total_attempts(),
                backoff_ms = dur.as_millis() as u64,
                error = %e,
                "Generative AI call failed, retrying"
            );
        })
        .await;

    let retried = retries.load(Ordering::Relaxed);
    match &result {
        Ok(_) if retried > 0 => {
            info!(operation, attempts = retried + 1, "Generative AI call succeeded after retry");
        }
        Ok(_) => {}
        Err(e) => {
            warn!(operation, attempts = retried + 1, error = %e, "Generative AI call failed");
        }
    }

    result
}

/// Generative AI client: text and image generation with retry and shape validation
#[derive(Debug, Clone)]
pub struct RetryingAiClient<T> {
    transport: T,
    config: AiConfig,
}

impl RetryingAiClient<HttpTransport> {
    /// Client talking to the configured HTTP endpoint
    pub fn from_config(config: AiConfig) -> Result<Self, AiError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(transport, config))
    }
}

impl<T: GenerativeTransport> RetryingAiClient<T> {
    pub fn new(transport: T, config: AiConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Generate text with the configured text model
    pub async fn generate_recipe_text(&self, prompt: &str) -> Result<String, AiError> {
        self.generate_text(prompt, &self.config.text_model).await
    }

    /// Generate text with an explicit model
    pub async fn generate_text(&self, prompt: &str, model: &str) -> Result<String, AiError> {
        let request = GenerateContentRequest::text(prompt);

        retry_with_backoff(&self.config.retry, "generate_text", || async {
            let response = self.transport.generate_content(model, &request).await?;
            response.text().map(str::to_string)
        })
        .await
    }

    /// Generate an image; returns the base64 payload
    pub async fn generate_image(&self, prompt: &str) -> Result<String, AiError> {
        let request = GenerateContentRequest::image(prompt);
        let model = self.config.image_model.as_str();

        retry_with_backoff(&self.config.retry, "generate_image", || async {
            let response = self.transport.generate_content(model, &request).await?;
            response.image_data().map(str::to_string)
        })
        .await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Transport replaying a fixed script of responses, recording every call
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Result<GenerateContentResponse, AiError>>>,
        pub calls: Mutex<Vec<(String, GenerateContentRequest)>>,
    }

    impl ScriptedTransport {
        pub fn new(script: Vec<Result<GenerateContentResponse, AiError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerativeTransport for ScriptedTransport {
        async fn generate_content(
            &self,
            model: &str,
            request: &GenerateContentRequest,
        ) -> Result<GenerateContentResponse, AiError> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), request.clone()));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(AiError::Transport("script exhausted".to_string())))
        }
    }

    pub fn text_response(text: &str) -> GenerateContentResponse {
        serde_json::from_value(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
        }))
        .unwrap()
    }

    pub fn image_response(data: &str) -> GenerateContentResponse {
        serde_json::from_value(serde_json::json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here is your cocktail" },
                { "inlineData": { "mimeType": "image/png", "data": data } }
            ] } }]
        }))
        .unwrap()
    }

    pub fn fast_config(max_retries: u32) -> AiConfig {
        AiConfig {
            retry: RetryConfig {
                max_retries,
                initial_backoff_ms: 0,
            },
            ..AiConfig::default()
        }
    }
}
