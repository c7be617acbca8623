//! Verified request/response wrapper around a completion backend.
//!
//! Construction sends a challenge containing a random token and requires the
//! token back. Every `execute` call tags its prompt with a fresh call id and
//! rejects any response that does not echo it, which catches truncated or
//! mismatched answers.

use crate::error::GatewayError;
use crate::llm::backend::CompletionBackend;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, error, info};

/// Prefix of every string `execute` returns on failure.
pub const LLM_ERROR_PREFIX: &str = "LLM_ERROR:";

/// Metadata about the most recent backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub call_id: u32,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub is_verification: bool,
}

pub struct LlmGateway {
    backend: Box<dyn CompletionBackend>,
    last_call: Mutex<Option<CallRecord>>,
}

impl LlmGateway {
    /// Wrap `backend` and run the verification handshake.
    pub async fn connect(backend: Box<dyn CompletionBackend>) -> Result<Self, GatewayError> {
        info!("Connecting to completion backend ({})", backend.model_name());
        let gateway = Self {
            backend,
            last_call: Mutex::new(None),
        };
        gateway.verify().await?;
        info!("Completion backend verified");
        Ok(gateway)
    }

    /// Send the challenge prompt and check the token comes back.
    pub async fn verify(&self) -> Result<(), GatewayError> {
        let token = fresh_call_id();
        let prompt = format!(
            "[VERIFICATION]\nThis is a connection test.\nRespond ONLY with: TEST_OK_{}",
            token
        );

        let response = self.call(token, &prompt, true).await?;
        if response.contains(&format!("TEST_OK_{}", token)) {
            Ok(())
        } else {
            Err(GatewayError::VerificationFailed(response))
        }
    }

    /// Run `task`, returning the response or an `LLM_ERROR: ...` string.
    pub async fn execute(&self, task: &str) -> String {
        match self.try_execute(task).await {
            Ok(response) => response,
            Err(e) => format!("{} {}", LLM_ERROR_PREFIX, e),
        }
    }

    /// Run `task` and require the call id to be echoed in the response.
    pub async fn try_execute(&self, task: &str) -> Result<String, GatewayError> {
        let call_id = fresh_call_id();
        let prompt = format!(
            "[CALL_ID:{call_id}]\n[INSTRUCTION]\n{task}\n\n[REQUIREMENTS]\n1. Include CALL_ID in response\n2. Be accurate and concise"
        );

        let response = self.call(call_id, &prompt, false).await?;
        if response.contains(&call_id.to_string()) {
            Ok(response)
        } else {
            error!("LLM call #{} response did not echo its id", call_id);
            Err(GatewayError::CallIdMissing { call_id, response })
        }
    }

    /// Metadata of the most recent call, if any.
    pub fn last_call(&self) -> Option<CallRecord> {
        self.last_call.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    async fn call(
        &self,
        call_id: u32,
        prompt: &str,
        is_verification: bool,
    ) -> Result<String, GatewayError> {
        if let Ok(mut guard) = self.last_call.lock() {
            *guard = Some(CallRecord {
                call_id,
                timestamp: Utc::now(),
                prompt: prompt.to_string(),
                is_verification,
            });
        }

        debug!("LLM call #{} prompt: {}", call_id, preview(prompt, 100));
        let start = Instant::now();

        match self.backend.complete(prompt).await {
            Ok(content) => {
                info!(
                    "LLM call #{} completed in {:.2}s",
                    call_id,
                    start.elapsed().as_secs_f64()
                );
                debug!("LLM call #{} response: {}", call_id, preview(&content, 200));
                Ok(content)
            }
            Err(e) => {
                error!("LLM call #{} failed: {}", call_id, e);
                Err(e)
            }
        }
    }
}

fn fresh_call_id() -> u32 {
    rand::rng().random_range(100_000..=999_999)
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Scripted backends for tests.
#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use async_trait::async_trait;

    /// Echoes the prompt back, so every id is present.
    pub struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
            Ok(format!("echo: {}", prompt))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    /// Passes verification, then answers every task with a fixed reply.
    pub struct FixedReplyBackend(pub String);

    #[async_trait]
    impl CompletionBackend for FixedReplyBackend {
        async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
            if prompt.starts_with("[VERIFICATION]") {
                Ok(prompt.rsplit(' ').next().unwrap_or_default().to_string())
            } else {
                Ok(self.0.clone())
            }
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    /// Ignores the prompt entirely.
    pub struct SilentBackend;

    #[async_trait]
    impl CompletionBackend for SilentBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, GatewayError> {
            Ok("hello".to_string())
        }

        fn model_name(&self) -> &str {
            "silent"
        }
    }

    /// Passes verification, then fails every task.
    pub struct FailingBackend;

    #[async_trait]
    impl CompletionBackend for FailingBackend {
        async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
            if prompt.starts_with("[VERIFICATION]") {
                Ok(prompt.to_string())
            } else {
                Err(GatewayError::Api {
                    status: 401,
                    body: "invalid api key".to_string(),
                })
            }
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }
}
