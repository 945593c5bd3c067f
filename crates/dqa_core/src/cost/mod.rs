//! Embedding cost estimation.
//!
//! The whole document set is serialized to JSON and tokenized with the tokenizer family of the
//! embedding model. The tokenizer handle is acquired per estimate and dropped before returning.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::Document;
use crate::error::AppError;

mod tiktoken;

pub use tiktoken::TiktokenSource;

/// List price of `text-embedding-ada-002`, USD per 1000 tokens.
pub const DEFAULT_RATE_PER_THOUSAND_TOKENS: f64 = 0.0004;

pub trait Tokenizer {
    fn count_tokens(&self, text: &str) -> usize;
}

/// Loads a tokenizer for a model. The returned handle owns its resources and releases them on drop.
pub trait TokenizerSource: Send + Sync {
    fn acquire(&self, model: &str) -> Result<Box<dyn Tokenizer>, AppError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostEstimate {
    pub token_count: usize,
    pub cost_usd: f64,
    pub documents_sha256: String,
}

#[derive(Debug, Clone)]
pub struct CostEstimator {
    model: String,
    rate_per_thousand_tokens: f64,
}

impl CostEstimator {
    pub fn new(model: impl Into<String>, rate_per_thousand_tokens: f64) -> Self {
        Self {
            model: model.into(),
            rate_per_thousand_tokens: rate_per_thousand_tokens.max(0.0),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn cost_for_tokens(&self, token_count: usize) -> f64 {
        (token_count as f64 / 1000.0) * self.rate_per_thousand_tokens
    }

    pub fn estimate(
        &self,
        source: &dyn TokenizerSource,
        documents: &[Document],
    ) -> Result<CostEstimate, AppError> {
        let serialized = serialize_documents(documents)?;
        let documents_sha256 = sha256_hex(serialized.as_bytes());
        let token_count = self.count(source, documents, &serialized)?;
        Ok(CostEstimate {
            token_count,
            cost_usd: self.cost_for_tokens(token_count),
            documents_sha256,
        })
    }

    fn count(
        &self,
        source: &dyn TokenizerSource,
        documents: &[Document],
        serialized: &str,
    ) -> Result<usize, AppError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let tokenizer = source.acquire(&self.model)?;
        let n = tokenizer.count_tokens(serialized);
        drop(tokenizer);
        debug!(model = %self.model, tokens = n, "tokenized document set");
        Ok(n)
    }
}

/// Remembers the last estimate and re-tokenizes only when the document set hash changes.
#[derive(Debug, Default)]
pub struct CostCache {
    last: Option<CostEstimate>,
}

impl CostCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn estimate(
        &mut self,
        estimator: &CostEstimator,
        source: &dyn TokenizerSource,
        documents: &[Document],
    ) -> Result<CostEstimate, AppError> {
        let serialized = serialize_documents(documents)?;
        let hash = sha256_hex(serialized.as_bytes());
        if let Some(last) = self.last.as_ref() {
            if last.documents_sha256 == hash {
                debug!(hash = %hash, "document set unchanged; reusing cost estimate");
                return Ok(last.clone());
            }
        }

        let token_count = estimator.count(source, documents, &serialized)?;
        let est = CostEstimate {
            token_count,
            cost_usd: estimator.cost_for_tokens(token_count),
            documents_sha256: hash,
        };
        debug!(tokens = est.token_count, "cached new cost estimate");
        self.last = Some(est.clone());
        Ok(est)
    }

    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

pub fn serialize_documents(documents: &[Document]) -> Result<String, AppError> {
    serde_json::to_string(documents).map_err(|e| {
        AppError::new("LOADER_ERROR", "Failed to serialize documents for cost estimation")
            .with_details(e.to_string())
    })
}

/// Content hash of a document set, stable across runs.
pub fn documents_sha256(documents: &[Document]) -> Result<String, AppError> {
    Ok(sha256_hex(serialize_documents(documents)?.as_bytes()))
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
