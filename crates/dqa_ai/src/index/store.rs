use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use dqa_core::error::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::model::{IndexArtifact, IndexBuildInput, IndexStatus, INDEX_FORMAT_VERSION};
use crate::chunking::Chunk;
use crate::embeddings::Embedder;

/// On-disk vector index: a directory holding status, chunks, and vectors keyed by chunk id.
///
/// The status file is written last, so a directory without it never counts as an index.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn status_path(&self) -> PathBuf {
        self.root.join("index_status.json")
    }

    fn chunks_path(&self) -> PathBuf {
        self.root.join("index_chunks.json")
    }

    fn vectors_path(&self) -> PathBuf {
        self.root.join("index_vectors.json")
    }

    pub fn exists(&self) -> bool {
        self.status_path().is_file()
    }

    pub fn status(&self) -> Result<IndexStatus, AppError> {
        read_json(&self.status_path(), "index status")
    }

    /// Reads a persisted index and checks it is usable with `embedder`/`model`.
    pub fn load(&self, embedder: &dyn Embedder, model: &str) -> Result<IndexArtifact, AppError> {
        let status = self.status()?;
        if status.version != INDEX_FORMAT_VERSION {
            return Err(corrupt("Unsupported index format version")
                .with_details(format!("expected={INDEX_FORMAT_VERSION}; got={}", status.version)));
        }
        if status.model != model {
            return Err(corrupt("Index was built with a different embedding model")
                .with_details(format!("index_model={}; configured={model}", status.model)));
        }
        if let Some(dims) = embedder.dimensions(model) {
            if dims != status.dims {
                return Err(corrupt("Index dims do not match the embedding model")
                    .with_details(format!("index_dims={}; model_dims={dims}", status.dims)));
            }
        }

        let chunks: Vec<Chunk> = read_json(&self.chunks_path(), "index chunks")?;
        let mut by_id: BTreeMap<String, Vec<f32>> =
            read_json(&self.vectors_path(), "index vectors")?;

        if chunks.len() != status.chunk_count as usize {
            return Err(corrupt("Index chunk count does not match status").with_details(format!(
                "status={}; chunks={}",
                status.chunk_count,
                chunks.len()
            )));
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let v = by_id.remove(&chunk.chunk_id).ok_or_else(|| {
                corrupt("Index vector missing for chunk")
                    .with_details(format!("chunk_id={}", chunk.chunk_id))
            })?;
            if v.len() as u32 != status.dims {
                return Err(corrupt("Index vector dims mismatch").with_details(format!(
                    "chunk_id={}; expected={}; got={}",
                    chunk.chunk_id,
                    status.dims,
                    v.len()
                )));
            }
            vectors.push(v);
        }

        debug!(path = %self.root.display(), chunks = chunks.len(), "index loaded");
        Ok(IndexArtifact {
            status,
            chunks,
            vectors,
        })
    }

    /// Embeds every chunk. Pure with respect to disk; call [`IndexStore::save`] to persist.
    pub fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        input: &IndexBuildInput,
    ) -> Result<IndexArtifact, AppError> {
        if chunks.is_empty() {
            return Err(AppError::new(
                "INDEX_BUILD_FAILED",
                "No chunks available; add documents before building the index",
            ));
        }

        let mut dims: Option<u32> = None;
        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            if let Some(deadline) = input.deadline {
                if Instant::now() > deadline {
                    return Err(AppError::new(
                        "INDEX_BUILD_TIMEOUT",
                        "Index build exceeded its time limit",
                    )
                    .with_details(format!("embedded={}; total={}", vectors.len(), chunks.len()))
                    .with_retryable(true));
                }
            }

            let v = embedder.embed(&input.model, &chunk.text)?;
            let d = v.len() as u32;
            match dims {
                None => dims = Some(d),
                Some(expected) if expected != d => {
                    return Err(AppError::new(
                        "INDEX_BUILD_FAILED",
                        "Embedding dims mismatch across chunks",
                    )
                    .with_details(format!("expected={expected}; got={d}; chunk_id={}", chunk.chunk_id)));
                }
                Some(_) => {}
            }
            vectors.push(v);
        }

        let status = IndexStatus {
            version: INDEX_FORMAT_VERSION,
            model: input.model.clone(),
            dims: dims.unwrap_or(0),
            chunk_count: chunks.len() as u32,
            documents_sha256: input.documents_sha256.clone(),
            built_at: input.built_at.clone(),
        };
        info!(model = %status.model, dims = status.dims, chunks = status.chunk_count, "index built");
        Ok(IndexArtifact {
            status,
            chunks,
            vectors,
        })
    }

    pub fn save(&self, artifact: &IndexArtifact) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            AppError::new("INDEX_BUILD_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.root.display(), e))
        })?;

        let by_id: BTreeMap<&str, &Vec<f32>> = artifact
            .chunks
            .iter()
            .map(|c| c.chunk_id.as_str())
            .zip(artifact.vectors.iter())
            .collect();

        write_json_atomic(&self.chunks_path(), &artifact.chunks, "index chunks")?;
        write_json_atomic(&self.vectors_path(), &by_id, "index vectors")?;
        write_json_atomic(&self.status_path(), &artifact.status, "index status")?;
        info!(path = %self.root.display(), "index saved");
        Ok(())
    }
}

fn corrupt(message: &str) -> AppError {
    AppError::new("INDEX_CORRUPT", message)
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        corrupt(&format!("Failed to read {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        corrupt(&format!("Failed to decode {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T, what: &str) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("INDEX_BUILD_FAILED", format!("Failed to encode {what}"))
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new("INDEX_BUILD_FAILED", format!("Failed to write {what}"))
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new("INDEX_BUILD_FAILED", format!("Failed to finalize {what} write"))
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })?;
    Ok(())
}
