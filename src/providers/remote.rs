//! Shared plumbing for HTTP API providers: bounded concurrency, optional
//! request spacing, capped exponential backoff, and status mapping.

use super::error::ModelError;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Connection settings common to every remote provider.
#[derive(Debug, Clone)]
pub(crate) struct RemoteSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub max_concurrent_requests: usize,
    pub request_interval: Option<Duration>,
    pub retry_attempts: u32,
}

/// One provider instance's HTTP client with its rate controls.
pub(crate) struct RemoteClient {
    provider: &'static str,
    http: reqwest::Client,
    settings: RemoteSettings,
    limiter: Semaphore,
    last_request: Mutex<Option<Instant>>,
}

impl RemoteClient {
    pub(crate) fn new(
        provider: &'static str,
        settings: RemoteSettings,
    ) -> Result<Self, ModelError> {
        if settings.api_key.trim().is_empty() {
            return Err(ModelError::InvalidConfig {
                message: format!("{provider} requires an api_key"),
            });
        }
        if settings.base_url.trim().is_empty() {
            return Err(ModelError::InvalidConfig {
                message: format!("{provider} requires a base_url"),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ModelError::Http {
                provider,
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let limiter = Semaphore::new(settings.max_concurrent_requests.max(1));

        Ok(Self {
            provider,
            http,
            settings,
            limiter,
            last_request: Mutex::new(None),
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        self.settings.base_url.trim_end_matches('/')
    }

    /// POSTs a JSON body and returns the parsed JSON response.
    ///
    /// Retries transport failures, 5xx, and 429 with capped exponential
    /// backoff; a 429 with `Retry-After` sleeps for that long instead.
    /// 4xx responses fail immediately.
    pub(crate) async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ModelError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .expect("request limiter closed");
        self.pace().await;

        let url = format!("{}{}", self.base_url(), path);
        let mut attempt: u32 = 0;

        loop {
            match self.send_once(&url, body).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.settings.retry_attempts => {
                    let delay = match &e {
                        ModelError::RateLimited {
                            retry_after_secs: Some(secs),
                        } => Duration::from_secs(*secs).min(BACKOFF_CAP),
                        _ => (BACKOFF_BASE * 2u32.saturating_pow(attempt)).min(BACKOFF_CAP),
                    };
                    warn!(
                        provider = self.provider,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying remote request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, url: &str, body: &Value) -> Result<Value, ModelError> {
        debug!(provider = self.provider, url, "remote request");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.settings.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout {
                        seconds: self.settings.timeout.as_secs(),
                    }
                } else {
                    ModelError::Http {
                        provider: self.provider,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(self.provider, status.as_u16(), retry_after, text));
        }

        response.json().await.map_err(|e| ModelError::ResponseShape {
            provider: self.provider,
            message: format!("invalid JSON body: {e}"),
        })
    }

    /// Enforces the configured minimum spacing between requests.
    async fn pace(&self) {
        let Some(interval) = self.settings.request_interval else {
            return;
        };

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

fn map_status(
    provider: &'static str,
    status: u16,
    retry_after_secs: Option<u64>,
    body: String,
) -> ModelError {
    match status {
        429 => ModelError::RateLimited { retry_after_secs },
        401 | 403 => ModelError::Unauthorized,
        _ => ModelError::Api {
            provider,
            status,
            message: if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body
            },
        },
    }
}

/// Pulls `data[].embedding` out of an OpenAI-shaped embeddings response.
pub(crate) fn parse_embeddings_response(
    provider: &'static str,
    response: &Value,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ModelError> {
    let data = response
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ModelError::ResponseShape {
            provider,
            message: "missing 'data' array".to_string(),
        })?;

    if data.len() != expected {
        return Err(ModelError::ResponseShape {
            provider,
            message: format!("expected {} embeddings, got {}", expected, data.len()),
        });
    }

    // Some backends return entries out of order; `index` is authoritative.
    let mut vectors: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (position, entry) in data.iter().enumerate() {
        let index = entry
            .get("index")
            .and_then(Value::as_u64)
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = entry
            .get("embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| ModelError::ResponseShape {
                provider,
                message: "entry missing 'embedding'".to_string(),
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        if index >= expected {
            return Err(ModelError::ResponseShape {
                provider,
                message: format!("embedding index {index} out of range"),
            });
        }
        vectors[index] = Some(embedding);
    }

    vectors
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| ModelError::ResponseShape {
                provider,
                message: "missing embedding entry".to_string(),
            })
        })
        .collect()
}

/// Pulls `choices[0].message.content` and usage out of a chat response.
pub(crate) fn parse_chat_response(
    provider: &'static str,
    response: &Value,
) -> Result<(String, Option<u32>, Option<u32>), ModelError> {
    let text = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::ResponseShape {
            provider,
            message: "missing 'choices[0].message.content'".to_string(),
        })?
        .to_string();

    let usage = response.get("usage");
    let prompt_tokens = usage
        .and_then(|u| u.get("prompt_tokens"))
        .and_then(Value::as_u64)
        .map(|v| v as u32);
    let completion_tokens = usage
        .and_then(|u| u.get("completion_tokens"))
        .and_then(Value::as_u64)
        .map(|v| v as u32);

    Ok((text, prompt_tokens, completion_tokens))
}
