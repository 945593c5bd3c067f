use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::chunking::Chunk;
use crate::retrieve::IndexRetriever;

pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatus {
    pub version: u32,
    pub model: String,
    pub dims: u32,
    pub chunk_count: u32,
    /// Hash of the document set the index was built from.
    pub documents_sha256: String,
    pub built_at: String, // RFC3339
}

#[derive(Debug, Clone)]
pub struct IndexBuildInput {
    pub model: String,
    pub documents_sha256: String,
    pub built_at: String,
    pub deadline: Option<Instant>,
}

/// Chunks plus one vector per chunk, aligned by position.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexArtifact {
    pub status: IndexStatus,
    pub chunks: Vec<Chunk>,
    pub vectors: Vec<Vec<f32>>,
}

impl IndexArtifact {
    pub fn as_retriever(&self) -> IndexRetriever<'_> {
        IndexRetriever::new(self)
    }

    pub fn is_stale_for(&self, documents_sha256: &str) -> bool {
        self.status.documents_sha256 != documents_sha256
    }
}
