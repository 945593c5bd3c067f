use std::time::Duration;

use dqa_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, Llm};
use crate::openai::OpenAiClient;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: OpenAiClient,
    timeout: Duration,
    retry: RetryPolicy,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(client: OpenAiClient, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client,
            timeout,
            retry,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl Llm for OpenAiChat {
    fn generate(&self, model: &str, messages: &[ChatMessage]) -> Result<String, AppError> {
        let req = ChatRequest {
            model,
            messages,
            temperature: self.temperature,
        };

        let resp: ChatResponse = self.retry.run("chat_completions", || {
            self.client
                .post_json("/v1/chat/completions", &req, self.timeout, "chat_completions")
        })?;

        let answer = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if answer.trim().is_empty() {
            return Err(AppError::new(
                "EXTERNAL_SERVICE_ERROR",
                "Chat completion response was empty",
            )
            .with_details(format!("model={model}")));
        }
        Ok(answer)
    }
}
