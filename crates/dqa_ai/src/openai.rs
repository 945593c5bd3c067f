use std::fmt;
use std::time::Duration;

use dqa_core::error::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Blocking client for an OpenAI-compatible HTTP API.
///
/// The API key is optional on purpose: a missing key is reported by the provider as a 401, which
/// surfaces as `CONFIGURATION_ERROR`.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl OpenAiClient {
    /// `base_url` is scheme + host (+ port), e.g. `https://api.openai.com`. Paths are rejected.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, AppError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;
        Ok(Self {
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
        operation: &str,
    ) -> Result<T, AppError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut req = ureq::post(&url).timeout(timeout);
        if let Some(key) = self.api_key.as_deref() {
            req = req.set("Authorization", &format!("Bearer {key}"));
        }

        match req.send_json(body) {
            Ok(resp) => resp.into_json::<T>().map_err(|e| {
                AppError::new("EXTERNAL_SERVICE_ERROR", "Failed to decode provider response")
                    .with_details(format!("op={operation}; err={e}"))
            }),
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(status_error(status, operation, &body))
            }
            Err(ureq::Error::Transport(t)) => Err(AppError::new(
                "EXTERNAL_SERVICE_ERROR",
                "Failed to reach provider",
            )
            .with_details(format!("op={operation}; err={t}"))
            .with_retryable(true)),
        }
    }
}

fn status_error(status: u16, operation: &str, body: &str) -> AppError {
    let details = format!("op={operation}; status={status}; body={}", truncate(body, 300));
    match status {
        401 | 403 => AppError::new("CONFIGURATION_ERROR", "Provider rejected the API credential")
            .with_details(details),
        429 | 500..=599 => AppError::new("EXTERNAL_SERVICE_ERROR", "Provider request failed")
            .with_details(details)
            .with_retryable(true),
        _ => AppError::new("EXTERNAL_SERVICE_ERROR", "Provider request failed").with_details(details),
    }
}

fn validate_base_url(base_url: &str) -> Result<(), AppError> {
    let invalid = || {
        AppError::new(
            "CONFIG_INVALID",
            "Provider base URL must be http(s)://host[:port] without a path",
        )
        .with_details(format!("base_url={base_url}"))
    };

    let rest = base_url
        .strip_prefix("https://")
        .or_else(|| base_url.strip_prefix("http://"))
        .ok_or_else(invalid)?;
    if rest.is_empty() || rest.contains(['/', '?', '#', '@', ' ']) {
        return Err(invalid());
    }
    if !rest.ends_with(']') {
        if let Some((host, port)) = rest.rsplit_once(':') {
            let port_ok = port.parse::<u16>().map(|p| p != 0).unwrap_or(false);
            if host.is_empty() || !port_ok {
                return Err(invalid());
            }
        }
    }
    Ok(())
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
