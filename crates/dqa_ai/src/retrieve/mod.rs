use std::cmp::Ordering;

use dqa_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::chunking::Chunk;
use crate::index::IndexArtifact;

mod similarity;

pub use similarity::{cosine_similarity, l2_norm};

pub const MAX_TOP_K: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Exhaustive cosine search over an in-memory index.
#[derive(Debug)]
pub struct IndexRetriever<'a> {
    artifact: &'a IndexArtifact,
    norms: Vec<f32>,
}

impl<'a> IndexRetriever<'a> {
    pub fn new(artifact: &'a IndexArtifact) -> Self {
        let norms = artifact.vectors.iter().map(|v| l2_norm(v)).collect();
        Self { artifact, norms }
    }

    pub fn len(&self) -> usize {
        self.artifact.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifact.chunks.is_empty()
    }

    /// Up to `k` chunks by descending score; equal scores fall back to `chunk_id` order.
    pub fn retrieve(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, AppError> {
        let k = k.clamp(1, MAX_TOP_K);
        let dims = self.artifact.status.dims as usize;
        if query.len() != dims {
            return Err(AppError::new(
                "RETRIEVAL_FAILED",
                "Query embedding dims do not match index dims",
            )
            .with_details(format!("index_dims={dims}; query_dims={}", query.len())));
        }
        let qnorm = l2_norm(query);
        if qnorm == 0.0 {
            return Err(AppError::new("RETRIEVAL_FAILED", "Query embedding norm is zero"));
        }

        let mut hits: Vec<(usize, f32)> = Vec::new();
        for (i, v) in self.artifact.vectors.iter().enumerate() {
            let vnorm = self.norms[i];
            if vnorm == 0.0 {
                continue;
            }
            hits.push((i, cosine_similarity(query, v, qnorm, vnorm)));
        }

        let chunks = &self.artifact.chunks;
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| chunks[a.0].chunk_id.cmp(&chunks[b.0].chunk_id))
        });
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(i, score)| RetrievedChunk {
                chunk: chunks[i].clone(),
                score,
            })
            .collect())
    }
}
