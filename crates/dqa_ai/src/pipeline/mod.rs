use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dqa_core::cost::{CostCache, CostEstimator, TokenizerSource, DEFAULT_RATE_PER_THOUSAND_TOKENS};
use dqa_core::domain::Document;
use dqa_core::error::AppError;
use dqa_core::ingest::load_directory;
use dqa_core::normalize::normalize_documents;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::chain::{QueryResult, RetrievalQaChain, DEFAULT_TOP_K};
use crate::chunking::{TextSplitter, DEFAULT_CHUNK_SIZE};
use crate::embeddings::Embedder;
use crate::index::{IndexArtifact, IndexBuildInput, IndexStore};
use crate::llm::Llm;

pub const DEFAULT_BUDGET_USD: f64 = 1.0;
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo-16k";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_INDEX_PATH: &str = "Documents.index";
pub const DEFAULT_DOCUMENTS_DIR: &str = "documents";

/// What to do when a persisted index was built from a different document set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexInvalidation {
    /// Keep serving the persisted index; it is only rebuilt when absent.
    #[default]
    Reuse,
    RebuildOnChange,
}

impl IndexInvalidation {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "reuse" => Some(Self::Reuse),
            "rebuild_on_change" => Some(Self::RebuildOnChange),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub documents_dir: PathBuf,
    pub index_path: PathBuf,
    pub chat_model: String,
    pub embedding_model: String,
    /// Runs whose estimated cost is strictly greater than this abort.
    pub budget_usd: f64,
    pub rate_per_thousand_tokens: f64,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub invalidation: IndexInvalidation,
    pub rebuild_on_corrupt: bool,
    pub index_build_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from(DEFAULT_DOCUMENTS_DIR),
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            budget_usd: DEFAULT_BUDGET_USD,
            rate_per_thousand_tokens: DEFAULT_RATE_PER_THOUSAND_TOKENS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: 0,
            top_k: DEFAULT_TOP_K,
            invalidation: IndexInvalidation::Reuse,
            rebuild_on_corrupt: true,
            index_build_timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    EstimatingCost,
    Aborted,
    IndexLoading,
    IndexBuilding,
    Retrieving,
    Answering,
    Done,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::EstimatingCost => "estimating_cost",
            Self::Aborted => "aborted",
            Self::IndexLoading => "index_loading",
            Self::IndexBuilding => "index_building",
            Self::Retrieving => "retrieving",
            Self::Answering => "answering",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Answered(QueryResult),
    /// Estimated cost was over budget; no index work and no model call happened.
    BudgetExceeded {
        token_count: usize,
        estimated_cost_usd: f64,
        budget_usd: f64,
    },
}

/// Budget check, index build-or-load, then retrieval-augmented answering.
pub struct RetrievalPipeline {
    config: PipelineConfig,
    splitter: TextSplitter,
    estimator: CostEstimator,
    index_store: IndexStore,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn Llm>,
    tokenizers: Arc<dyn TokenizerSource>,
    cost_cache: Mutex<CostCache>,
    index_lock: Mutex<()>,
}

impl fmt::Debug for RetrievalPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RetrievalPipeline {
    pub fn new(
        config: PipelineConfig,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn Llm>,
        tokenizers: Arc<dyn TokenizerSource>,
    ) -> Result<Self, AppError> {
        if !config.budget_usd.is_finite() || config.budget_usd < 0.0 {
            return Err(AppError::new("CONFIG_INVALID", "Budget must be a non-negative number")
                .with_details(format!("budget_usd={}", config.budget_usd)));
        }
        let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;
        // The budget covers embedding the corpus, so count with the embedding model's encoding.
        let estimator =
            CostEstimator::new(config.embedding_model.clone(), config.rate_per_thousand_tokens);
        let index_store = IndexStore::open(config.index_path.clone());
        Ok(Self {
            config,
            splitter,
            estimator,
            index_store,
            embedder,
            llm,
            tokenizers,
            cost_cache: Mutex::new(CostCache::new()),
            index_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn index_present(&self) -> bool {
        self.index_store.exists()
    }

    pub fn run(&self, question: &str) -> Result<RunOutcome, AppError> {
        enter(PipelineStage::Idle);
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::new("RETRIEVAL_FAILED", "Question must not be empty"));
        }

        enter(PipelineStage::EstimatingCost);
        let report = load_directory(&self.config.documents_dir)?;
        let estimate = self.cost_cache.lock().estimate(
            &self.estimator,
            self.tokenizers.as_ref(),
            &report.documents,
        )?;
        info!(
            tokens = estimate.token_count,
            cost_usd = estimate.cost_usd,
            budget_usd = self.config.budget_usd,
            "estimated embedding cost"
        );

        if estimate.cost_usd > self.config.budget_usd {
            enter(PipelineStage::Aborted);
            warn!(
                cost_usd = estimate.cost_usd,
                budget_usd = self.config.budget_usd,
                "estimated cost exceeds budget; aborting run"
            );
            return Ok(RunOutcome::BudgetExceeded {
                token_count: estimate.token_count,
                estimated_cost_usd: estimate.cost_usd,
                budget_usd: self.config.budget_usd,
            });
        }

        let artifact = self.resolve_index(&report.documents, &estimate.documents_sha256)?;

        let chain = RetrievalQaChain::new(
            self.config.chat_model.clone(),
            self.config.embedding_model.clone(),
            self.config.top_k,
        );
        let retriever = artifact.as_retriever();

        enter(PipelineStage::Retrieving);
        let hits = chain.retrieve(&retriever, self.embedder.as_ref(), question)?;

        enter(PipelineStage::Answering);
        let mut result = chain.answer(self.llm.as_ref(), question, &hits)?;
        result.skipped_sources = report.failures;

        enter(PipelineStage::Done);
        Ok(RunOutcome::Answered(result))
    }

    /// Load the persisted index, or build and save it. At most one caller is in here at a time.
    fn resolve_index(
        &self,
        documents: &[Document],
        documents_sha256: &str,
    ) -> Result<IndexArtifact, AppError> {
        let _guard = self.index_lock.lock();
        let model = self.config.embedding_model.as_str();

        if self.index_store.exists() {
            enter(PipelineStage::IndexLoading);
            match self.index_store.load(self.embedder.as_ref(), model) {
                Ok(artifact) => {
                    if !artifact.is_stale_for(documents_sha256) {
                        return Ok(artifact);
                    }
                    match self.config.invalidation {
                        IndexInvalidation::Reuse => {
                            info!(
                                built_from = %artifact.status.documents_sha256,
                                current = %documents_sha256,
                                "document set changed since index build; reusing existing index"
                            );
                            return Ok(artifact);
                        }
                        IndexInvalidation::RebuildOnChange => {
                            info!("document set changed since index build; rebuilding");
                        }
                    }
                }
                Err(e) if e.is("INDEX_CORRUPT") && self.config.rebuild_on_corrupt => {
                    warn!(error = %e, "persisted index unusable; rebuilding");
                }
                Err(e) => return Err(e),
            }
        }

        enter(PipelineStage::IndexBuilding);
        let normalized = normalize_documents(documents);
        let chunks = self.splitter.chunk_normalized(documents, &normalized);
        info!(documents = documents.len(), chunks = chunks.len(), "chunked documents");

        let input = IndexBuildInput {
            model: model.to_string(),
            documents_sha256: documents_sha256.to_string(),
            built_at: now_rfc3339()?,
            deadline: Instant::now().checked_add(self.config.index_build_timeout),
        };
        let artifact = IndexStore::build(chunks, self.embedder.as_ref(), &input)?;
        self.index_store.save(&artifact)?;
        Ok(artifact)
    }
}

fn enter(stage: PipelineStage) {
    info!(stage = stage.as_str(), "pipeline stage");
}

fn now_rfc3339() -> Result<String, AppError> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new("INDEX_BUILD_FAILED", "Failed to format index timestamp")
            .with_details(e.to_string())
    })
}
