use medbot_shared::ChatMessage;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::UpstreamSettings;
use crate::error::UpstreamError;
use crate::prompt::SystemPrompt;

/// Shown to users whenever the upstream call fails under the lenient policy.
pub const FALLBACK_REPLY: &str =
    "Sorry, I'm unable to respond at the moment. Please try again later.";

/// Body posted to the completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionPayload {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct LlmService {
    client: reqwest::Client,
    settings: UpstreamSettings,
    system_prompt: SystemPrompt,
}

impl LlmService {
    pub fn new(settings: UpstreamSettings, system_prompt: SystemPrompt) -> Result<Self, UpstreamError> {
        info!("Initializing LLM service with model: {}", settings.model);
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(format!("medbot/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Configuration(format!("Failed to build reqwest client: {e}")))?;

        Ok(Self {
            client,
            settings,
            system_prompt,
        })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// The system rules always come first, the user's text second and untouched.
    pub fn build_payload(&self, message: &str) -> CompletionPayload {
        CompletionPayload {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage::system(self.system_prompt.as_str()),
                ChatMessage::user(message),
            ],
        }
    }

    /// Sends `message` upstream, retrying transient failures with exponential backoff.
    #[tracing::instrument(name = "completion", skip(self, message), fields(model = %self.settings.model))]
    pub async fn complete(&self, message: &str) -> Result<String, UpstreamError> {
        let payload = self.build_payload(message);
        let max_retries = self.settings.max_retries;
        let mut attempt = 0;

        loop {
            match self.send_once(&payload).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    warn!(attempt, error = %e, "Transient upstream failure, retrying");
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts = attempt + 1, "Upstream completion failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(&self, payload: &CompletionPayload) -> Result<String, UpstreamError> {
        let response = self
            .client
            .post(&self.settings.api_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.settings.api_key))
            .header(CONTENT_TYPE, "application/json")
            .header("HTTP-Referer", &self.settings.referer)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = %status, bytes = body.len(), "Upstream request successful");
        extract_reply(&body)
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms =
            self.settings.initial_retry_delay.as_millis() as f64 * 2_f64.powi(attempt as i32);
        // +/- 10% jitter
        let jitter = rand::random::<f64>() * 0.2 + 0.9;
        Duration::from_millis((base_ms * jitter) as u64).min(self.settings.max_retry_delay)
    }
}

/// Pulls `choices[0].message.content` out of a completions response body.
fn extract_reply(body: &str) -> Result<String, UpstreamError> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::Parse(format!("invalid JSON: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamError::Parse("response has no choices".to_string()))?
        .message
        .and_then(|message| message.content)
        .ok_or_else(|| UpstreamError::Parse("first choice has no message content".to_string()))
}
