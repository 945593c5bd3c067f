use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dqa_ai::pipeline::{IndexInvalidation, PipelineConfig};
use dqa_ai::retry::RetryPolicy;
use dqa_core::error::AppError;

pub const DEFAULT_QUESTION: &str =
    "Qui est Sakura Kimura et qu'est-ce qu'elle aime faire de son temps?";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Process configuration, read once at startup from the environment (and `.env` when present).
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub question: String,
    pub pipeline: PipelineConfig,
    pub embed_timeout: Duration,
    pub chat_timeout: Duration,
    pub run_timeout: Duration,
    pub retry: RetryPolicy,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("openai_base_url", &self.openai_base_url)
            .field("question", &self.question)
            .field("pipeline", &self.pipeline)
            .field("embed_timeout", &self.embed_timeout)
            .field("chat_timeout", &self.chat_timeout)
            .field("run_timeout", &self.run_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = PipelineConfig::default();

        let invalidation = match get("DQA_INDEX_INVALIDATION") {
            None => defaults.invalidation,
            Some(raw) => IndexInvalidation::parse(&raw).ok_or_else(|| {
                invalid("DQA_INDEX_INVALIDATION", &raw, "expected reuse|rebuild_on_change")
            })?,
        };

        let pipeline = PipelineConfig {
            documents_dir: get("DQA_DOCUMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.documents_dir),
            index_path: get("DQA_INDEX_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_path),
            chat_model: get("DQA_CHAT_MODEL").unwrap_or(defaults.chat_model),
            embedding_model: get("DQA_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            budget_usd: parse_or(&get, "DQA_BUDGET_USD", defaults.budget_usd)?,
            rate_per_thousand_tokens: parse_or(
                &get,
                "DQA_RATE_PER_1K_TOKENS",
                defaults.rate_per_thousand_tokens,
            )?,
            chunk_size: parse_or(&get, "DQA_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_or(&get, "DQA_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: parse_or(&get, "DQA_TOP_K", defaults.top_k)?,
            invalidation,
            rebuild_on_corrupt: parse_bool_or(&get, "DQA_REBUILD_ON_CORRUPT", defaults.rebuild_on_corrupt)?,
            index_build_timeout: secs_or(&get, "DQA_INDEX_BUILD_TIMEOUT_SECS", defaults.index_build_timeout)?,
        };

        let retry_defaults = RetryPolicy::default();
        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 8080u16)?,
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            question: get("DQA_QUESTION").unwrap_or_else(|| DEFAULT_QUESTION.to_string()),
            pipeline,
            embed_timeout: secs_or(&get, "DQA_EMBED_TIMEOUT_SECS", Duration::from_secs(30))?,
            chat_timeout: secs_or(&get, "DQA_CHAT_TIMEOUT_SECS", Duration::from_secs(60))?,
            run_timeout: secs_or(&get, "DQA_RUN_TIMEOUT_SECS", Duration::from_secs(900))?,
            retry: RetryPolicy {
                max_attempts: parse_or(&get, "DQA_RETRY_MAX_ATTEMPTS", retry_defaults.max_attempts)?,
                base_delay: Duration::from_millis(parse_or(
                    &get,
                    "DQA_RETRY_BASE_DELAY_MS",
                    retry_defaults.base_delay.as_millis() as u64,
                )?),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn invalid(key: &str, raw: &str, why: impl fmt::Display) -> AppError {
    AppError::new("CONFIG_INVALID", format!("Invalid value for {key}"))
        .with_details(format!("value={raw}; err={why}"))
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| invalid(key, &raw, e)),
    }
}

fn parse_bool_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool, AppError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(key, &raw, "expected a boolean")),
        },
    }
}

fn secs_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, AppError> {
    let secs = parse_or(get, key, default.as_secs())?;
    if secs == 0 {
        return Err(invalid(key, "0", "timeout must be at least one second"));
    }
    Ok(Duration::from_secs(secs))
}
