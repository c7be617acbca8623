//! Text-completion backends.
//!
//! The gateway talks to a `CompletionBackend`. The production backend posts
//! to an OpenAI-compatible `/chat/completions` endpoint.

use crate::error::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// A single-prompt, single-response text completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send `prompt` and return the generated text.
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError>;

    /// Identifier of the model answering, for logs.
    fn model_name(&self) -> &str;
}

/// Everything needed to reach the completion API. Built once at startup.
#[derive(Clone)]
pub struct LlmSettings {
    pub api_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Backend for OpenAI-compatible chat completion APIs (Groq by default).
pub struct ChatCompletionsBackend {
    settings: LlmSettings,
    http_client: reqwest::Client,
}

impl ChatCompletionsBackend {
    pub fn new(settings: LlmSettings) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::ClientBuild(e.to_string()))?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.api_url.trim_end_matches('/')
        )
    }

    fn build_request<'a>(&'a self, prompt: &str) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionsBackend {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        let url = self.endpoint();
        debug!("POST {} ({} prompt bytes)", url, prompt.len());

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.settings.timeout)
                } else if e.is_connect() {
                    GatewayError::Connect(self.settings.api_url.clone())
                } else {
                    GatewayError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api { status, body });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        extract_content(completion)
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}

fn extract_content(completion: ChatCompletionResponse) -> Result<String, GatewayError> {
    completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| GatewayError::MalformedResponse("response has no choices".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LlmSettings {
        LlmSettings {
            api_url: "https://api.groq.com/openai/v1/".to_string(),
            model: "llama3-70b-8192".to_string(),
            api_key: "secret-key".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", settings());
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_endpoint_and_request_shape() {
        let backend = ChatCompletionsBackend::new(settings()).unwrap();
        assert_eq!(
            backend.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );

        let value = serde_json::to_value(backend.build_request("hi")).unwrap();
        assert_eq!(value["model"], "llama3-70b-8192");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
        assert_eq!(value["max_tokens"], 1024);
        assert_eq!(backend.model_name(), "llama3-70b-8192");
    }

    #[test]
    fn test_extract_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"PING"}}]}"#;
        let completion: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(extract_content(completion).unwrap(), "PING");

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            extract_content(empty),
            Err(GatewayError::MalformedResponse(_))
        ));
    }
}
