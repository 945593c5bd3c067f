use dqa_core::error::AppError;
use dqa_core::ingest::LoadFailure;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embeddings::Embedder;
use crate::llm::{ChatMessage, Llm};
use crate::retrieve::{IndexRetriever, RetrievedChunk};

pub mod prompts;

pub const DEFAULT_TOP_K: usize = 4;
const SNIPPET_CHARS: usize = 280;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceReference {
    pub chunk_id: String,
    pub source: String,
    pub ordinal: u32,
    pub score: f32,
    pub snippet: String,
}

impl From<&RetrievedChunk> for SourceReference {
    fn from(hit: &RetrievedChunk) -> Self {
        Self {
            chunk_id: hit.chunk.chunk_id.clone(),
            source: hit.chunk.source().to_string(),
            ordinal: hit.chunk.ordinal,
            score: hit.score,
            snippet: snippet_first_chars(&hit.chunk.text, SNIPPET_CHARS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub answer: String,
    pub source_documents: Vec<SourceReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_sources: Vec<LoadFailure>,
}

/// Retrieval-augmented QA: embed the question, take the top-k chunks, and answer from them.
#[derive(Debug, Clone)]
pub struct RetrievalQaChain {
    chat_model: String,
    embedding_model: String,
    top_k: usize,
}

impl RetrievalQaChain {
    pub fn new(chat_model: impl Into<String>, embedding_model: impl Into<String>, top_k: usize) -> Self {
        Self {
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            top_k,
        }
    }

    pub fn retrieve(
        &self,
        retriever: &IndexRetriever<'_>,
        embedder: &dyn Embedder,
        question: &str,
    ) -> Result<Vec<RetrievedChunk>, AppError> {
        let q = question.trim();
        if q.is_empty() {
            return Err(AppError::new("RETRIEVAL_FAILED", "Question must not be empty"));
        }
        let qv = embedder.embed(&self.embedding_model, q)?;
        let hits = retriever.retrieve(&qv, self.top_k)?;
        debug!(hits = hits.len(), "retrieved context");
        Ok(hits)
    }

    pub fn answer(
        &self,
        llm: &dyn Llm,
        question: &str,
        hits: &[RetrievedChunk],
    ) -> Result<QueryResult, AppError> {
        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        let prompt = prompts::stuff_qa_prompt(&prompts::context_block(&texts), question.trim());
        let messages = [
            ChatMessage::system(prompts::ASSISTANT_PERSONA),
            ChatMessage::user(prompt),
        ];
        let answer = llm.generate(&self.chat_model, &messages)?;

        Ok(QueryResult {
            answer: answer.trim().to_string(),
            source_documents: hits.iter().map(SourceReference::from).collect(),
            skipped_sources: Vec::new(),
        })
    }

    pub fn call(
        &self,
        retriever: &IndexRetriever<'_>,
        embedder: &dyn Embedder,
        llm: &dyn Llm,
        question: &str,
    ) -> Result<QueryResult, AppError> {
        let hits = self.retrieve(retriever, embedder, question)?;
        self.answer(llm, question, &hits)
    }
}

fn snippet_first_chars(text: &str, max_chars: usize) -> String {
    let t = text.trim();
    match t.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &t[..idx]),
        None => t.to_string(),
    }
}
