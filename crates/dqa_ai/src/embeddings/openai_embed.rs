use std::time::Duration;

use dqa_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::openai::{truncate, OpenAiClient};
use crate::retry::RetryPolicy;

// ~8k tokens for the ada/3-series models; chars are a conservative proxy.
const MAX_INPUT_CHARS: usize = 24_000;

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    pub fn new(client: OpenAiClient, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client,
            timeout,
            retry,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let req = EmbeddingsRequest {
            model,
            input: truncate(input, MAX_INPUT_CHARS),
        };

        let resp: EmbeddingsResponse = self.retry.run("embeddings", || {
            self.client
                .post_json("/v1/embeddings", &req, self.timeout, "embeddings")
        })?;

        let embedding = resp
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .unwrap_or_default();
        if embedding.is_empty() {
            return Err(AppError::new(
                "EXTERNAL_SERVICE_ERROR",
                "Embeddings response was empty",
            )
            .with_details(format!("model={model}")));
        }
        Ok(embedding)
    }
}
