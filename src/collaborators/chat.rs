// =============================================================================
// Chat Completions Generator — Azure-style deployment endpoint
// =============================================================================
//
// POST {endpoint}/openai/deployments/{deployment}/chat/completions
//      ?api-version={api_version}
//
// The prompt is sent as a single system message.  The API key is sent in the
// `api-key` header and is never logged or serialised.
// =============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{CollaboratorError, NarrativeGenerator};

fn default_endpoint() -> String {
    "https://example-resource.openai.azure.com".to_string()
}

fn default_deployment() -> String {
    "gpt".to_string()
}

fn default_api_version() -> String {
    "2024-02-15-preview".to_string()
}

fn default_temperature() -> f64 {
    0.5
}

fn default_max_tokens() -> u32 {
    500
}

/// Connection and sampling settings for the narrative generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_deployment")]
    pub deployment: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            deployment: default_deployment(),
            api_version: default_api_version(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// First non-empty completion in a raw response body.
fn first_completion(body: &str) -> Result<String, CollaboratorError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| CollaboratorError::Generation(format!("malformed response: {e}")))?;

    parsed
        .choices
        .into_iter()
        .filter_map(|c| c.message.content)
        .find(|c| !c.trim().is_empty())
        .ok_or_else(|| CollaboratorError::Generation("response contained no completion".to_string()))
}

#[derive(Clone)]
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    settings: LlmSettings,
    api_key: String,
}

impl ChatCompletionsGenerator {
    pub fn new(client: reqwest::Client, settings: LlmSettings, api_key: impl Into<String>) -> Self {
        Self {
            client,
            settings,
            api_key: api_key.into(),
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.deployment,
            self.settings.api_version
        )
    }
}

#[async_trait]
impl NarrativeGenerator for ChatCompletionsGenerator {
    #[instrument(skip(self, prompt), name = "chat::generate", fields(prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
        if self.api_key.is_empty() {
            return Err(CollaboratorError::Generation(
                "no API key configured".to_string(),
            ));
        }

        let request = ChatRequest {
            messages: vec![ChatMessage {
                role: "system",
                content: prompt,
            }],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let resp = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CollaboratorError::Generation(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| CollaboratorError::Generation(e.to_string()))?;

        if !status.is_success() {
            warn!(%status, "chat completion request rejected");
            return Err(CollaboratorError::Generation(format!(
                "chat completion returned {status}"
            )));
        }

        let text = first_completion(&body)?;
        debug!(reply_len = text.len(), "chat completion received");
        Ok(text)
    }
}
