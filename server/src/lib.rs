use std::sync::Arc;

use dqa_ai::embeddings::openai_embed::OpenAiEmbedder;
use dqa_ai::llm::openai_chat::OpenAiChat;
use dqa_ai::openai::OpenAiClient;
use dqa_ai::pipeline::RetrievalPipeline;
use dqa_core::cost::TiktokenSource;
use dqa_core::error::AppError;

pub mod config;
pub mod routes;

pub use routes::{build_app, AppState};

use config::ServerConfig;

pub async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener, AppError> {
    tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        AppError::new("SERVER_ERROR", "Failed to bind listen address")
            .with_details(format!("addr={addr}; err={e}"))
    })
}

/// Wires the OpenAI-backed embedder/chat clients and the tiktoken tokenizer into a pipeline.
pub fn build_pipeline(config: &ServerConfig) -> Result<RetrievalPipeline, AppError> {
    let client = OpenAiClient::new(&config.openai_base_url, config.openai_api_key.clone())?;
    let embedder = OpenAiEmbedder::new(client.clone(), config.embed_timeout, config.retry);
    let chat = OpenAiChat::new(client, config.chat_timeout, config.retry);
    RetrievalPipeline::new(
        config.pipeline.clone(),
        Arc::new(embedder),
        Arc::new(chat),
        Arc::new(TiktokenSource),
    )
}
