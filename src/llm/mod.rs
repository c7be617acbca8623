//! LLM gateway and completion backends.

pub mod backend;
pub mod gateway;

pub use backend::{ChatCompletionsBackend, LlmSettings};
pub use gateway::{LlmGateway, LLM_ERROR_PREFIX};
