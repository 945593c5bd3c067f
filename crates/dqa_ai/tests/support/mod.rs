#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use dqa_ai::embeddings::Embedder;
use dqa_ai::llm::{ChatMessage, Llm};
use dqa_ai::pipeline::PipelineConfig;
use dqa_core::cost::{Tokenizer, TokenizerSource};
use dqa_core::error::AppError;

const KEYWORDS: [&str; 4] = ["sakura", "kimura", "paris", "weather"];

/// Deterministic embedding: keyword counts plus a constant so no vector is all-zero.
#[derive(Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = input.to_lowercase();
        let mut v: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| lower.matches(k).count() as f32)
            .collect();
        v.push(1.0);
        Ok(v)
    }
}

pub struct RecordingLlm {
    reply: String,
    calls: AtomicUsize,
    last: Mutex<Vec<ChatMessage>>,
}

impl RecordingLlm {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            last: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last.lock().unwrap().clone()
    }
}

impl Llm for RecordingLlm {
    fn generate(&self, _model: &str, messages: &[ChatMessage]) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = messages.to_vec();
        Ok(self.reply.clone())
    }
}

/// Every non-empty document set tokenizes to the same fixed count.
pub struct FixedTokens(pub usize);

struct FixedTokenizer(usize);

impl Tokenizer for FixedTokenizer {
    fn count_tokens(&self, _text: &str) -> usize {
        self.0
    }
}

impl TokenizerSource for FixedTokens {
    fn acquire(&self, _model: &str) -> Result<Box<dyn Tokenizer>, AppError> {
        Ok(Box::new(FixedTokenizer(self.0)))
    }
}

pub fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

pub fn config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        documents_dir: root.join("documents"),
        index_path: root.join("Documents.index"),
        chat_model: "mock-chat".to_string(),
        embedding_model: "mock-embed".to_string(),
        ..PipelineConfig::default()
    }
}
