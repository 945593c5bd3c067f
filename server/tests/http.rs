use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use docqa_lib::{build_app, AppState};
use dqa_ai::embeddings::Embedder;
use dqa_ai::llm::{ChatMessage, Llm};
use dqa_ai::pipeline::{PipelineConfig, RetrievalPipeline};
use dqa_core::cost::{Tokenizer, TokenizerSource};
use dqa_core::error::AppError;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;

struct LetterEmbedder;

impl Embedder for LetterEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let lower = input.to_lowercase();
        Ok(vec![
            lower.matches("sakura").count() as f32,
            lower.matches("paris").count() as f32,
            1.0,
        ])
    }
}

#[derive(Default)]
struct CannedLlm {
    calls: AtomicUsize,
}

impl Llm for CannedLlm {
    fn generate(&self, _model: &str, _messages: &[ChatMessage]) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("Sakura Kimura aime peindre.".to_string())
    }
}

struct FailingLlm;

impl Llm for FailingLlm {
    fn generate(&self, _model: &str, _messages: &[ChatMessage]) -> Result<String, AppError> {
        Err(AppError::new("CONFIGURATION_ERROR", "Provider rejected the API credential"))
    }
}

struct Tokens(usize);

struct Fixed(usize);

impl Tokenizer for Fixed {
    fn count_tokens(&self, _text: &str) -> usize {
        self.0
    }
}

impl TokenizerSource for Tokens {
    fn acquire(&self, _model: &str) -> Result<Box<dyn Tokenizer>, AppError> {
        Ok(Box::new(Fixed(self.0)))
    }
}

fn setup(dir: &std::path::Path) -> PipelineConfig {
    let docs = dir.join("documents");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("sakura.txt"), "Sakura Kimura loves painting.").unwrap();
    fs::write(docs.join("paris.txt"), "Paris is mild in spring.").unwrap();
    PipelineConfig {
        documents_dir: docs,
        index_path: dir.join("Documents.index"),
        chat_model: "mock-chat".to_string(),
        embedding_model: "mock-embed".to_string(),
        rate_per_thousand_tokens: 1.0,
        ..PipelineConfig::default()
    }
}

fn app(config: PipelineConfig, llm: Arc<dyn Llm>, tokens: usize) -> Router {
    let pipeline =
        RetrievalPipeline::new(config, Arc::new(LetterEmbedder), llm, Arc::new(Tokens(tokens))).unwrap();
    build_app(AppState::new(
        Arc::new(pipeline),
        "Qui est Sakura Kimura ?",
        Duration::from_secs(30),
    ))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn chat_returns_answer_and_sources() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(CannedLlm::default());
    let (status, body) = get(app(setup(dir.path()), llm.clone(), 10), "/chat").await;

    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["answer"], "Sakura Kimura aime peindre.");
    let sources = v["sourceDocuments"].as_array().unwrap();
    assert!(!sources.is_empty());
    assert!(sources[0]["source"].as_str().unwrap().ends_with("sakura.txt"));
    assert!(v.get("skippedSources").is_none());
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn chat_over_budget_is_no_content() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(CannedLlm::default());
    // 1001 tokens at 1.0 USD / 1k tokens is just over the 1.0 budget.
    let (status, body) = get(app(setup(dir.path()), llm.clone(), 1001), "/chat").await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn provider_auth_failure_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = get(app(setup(dir.path()), Arc::new(FailingLlm), 10), "/chat").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["code"], "CONFIGURATION_ERROR");
    assert_eq!(v["retryable"], false);
}

#[tokio::test]
async fn missing_documents_dir_is_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        documents_dir: dir.path().join("absent"),
        ..setup(dir.path())
    };
    let (status, body) = get(app(config, Arc::new(CannedLlm::default()), 10), "/chat").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["code"], "LOADER_DIR_MISSING");
}

#[tokio::test]
async fn bind_failure_is_a_server_error() {
    let taken = docqa_lib::bind_listener("127.0.0.1:0").await.unwrap();
    let addr = taken.local_addr().unwrap().to_string();

    let err = docqa_lib::bind_listener(&addr).await.unwrap_err();
    assert_eq!(err.code, "SERVER_ERROR");
    assert!(err.details.unwrap_or_default().contains(&addr));
}

#[tokio::test]
async fn health_reports_index_presence() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let router = app(config, Arc::new(CannedLlm::default()), 10);

    let (status, body) = get(router.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        v,
        serde_json::json!({ "status": "ok", "service": "docqa", "index_present": false })
    );

    let (status, _) = get(router.clone(), "/chat").await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = get(router, "/health").await;
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["index_present"], true);
}
