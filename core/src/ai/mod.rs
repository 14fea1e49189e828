pub mod hints;
pub mod retry;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Faults tagged at the completion-capability boundary. Downstream code
/// branches on the variant, never on message text.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("API key rejected: {message}")]
    InvalidApiKey { message: String },
    #[error("access denied or blocked: {message}")]
    AccessDenied { message: String },
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_hint: Option<Duration>,
    },
    #[error("request could not be encoded: {message}")]
    InvalidRequest { message: String },
    #[error("network or server error: {message}")]
    Network { message: String },
    #[error("response did not match the declared schema: {message}")]
    MalformedResponse { message: String },
    #[error("completion returned no content")]
    EmptyResponse,
}

impl CompletionError {
    /// Terminal faults indicate a structural problem; retrying wastes quota.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CompletionError::InvalidApiKey { .. }
                | CompletionError::AccessDenied { .. }
                | CompletionError::InvalidRequest { .. }
                | CompletionError::EmptyResponse
        )
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system_instruction: String,
    pub user_message: String,
    /// When set, the capability is asked to fetch URLs named in the user
    /// message and use their contents as context.
    pub url_context: bool,
}

/// The single seam to the AI completion capability. Each call is an isolated
/// session: no conversation history exists anywhere behind this trait.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> anyhow::Result<Self> {
        // No request timeout: completion calls are allowed to run until the
        // server closes the stream or errors.
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, request.model, self.api_key
        );

        let mut body = serde_json::json!({
            "system_instruction": {
                "parts": [{ "text": request.system_instruction }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.user_message }]
            }],
            "generationConfig": { "temperature": 0.7 }
        });
        if request.url_context {
            body["tools"] = serde_json::json!([{ "url_context": {} }]);
        }

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, &headers, &body_text));
        }

        let mut response = response;
        let mut raw = String::new();
        while let Some(chunk) = response.chunk().await.map_err(classify_transport_error)? {
            raw.push_str(&String::from_utf8_lossy(&chunk));
        }
        drop(response);

        let text = collect_streamed_text(&raw)?;
        if text.trim().is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(text)
    }
}

fn classify_transport_error(error: reqwest::Error) -> CompletionError {
    if error.is_builder() {
        CompletionError::InvalidRequest {
            message: error.to_string(),
        }
    } else {
        CompletionError::Network {
            message: error.to_string(),
        }
    }
}

fn classify_http_failure(status: StatusCode, headers: &HeaderMap, body: &str) -> CompletionError {
    let message = snippet(body);
    match status {
        StatusCode::UNAUTHORIZED => CompletionError::InvalidApiKey { message },
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => CompletionError::AccessDenied { message },
        StatusCode::BAD_REQUEST => CompletionError::InvalidRequest { message },
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_hint = hints::retry_hint(headers, body);
            if retry_hint.is_none() && hints::is_quota_exhausted(body) {
                // Out-of-quota 429s are not transient.
                CompletionError::AccessDenied { message }
            } else {
                CompletionError::RateLimited {
                    message,
                    retry_hint,
                }
            }
        }
        _ => CompletionError::Network {
            message: format!("HTTP {status}: {message}"),
        },
    }
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty body)".to_string();
    }
    trimmed.chars().take(MAX).collect()
}

/// Candidate/content/parts shape declared once and validated here; anything
/// else becomes a recoverable fault instead of an error deep in a caller.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn blocked_reason(&self) -> Option<&str> {
        if let Some(feedback) = &self.prompt_feedback {
            if let Some(reason) = feedback.block_reason.as_deref() {
                return Some(reason);
            }
        }
        self.candidates
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|candidate| candidate.finish_reason.as_deref())
            .find(|reason| reason.eq_ignore_ascii_case("safety"))
    }

    fn concatenated_text(&self) -> String {
        let mut out = String::new();
        for candidate in self.candidates.as_deref().unwrap_or_default() {
            let Some(content) = &candidate.content else {
                continue;
            };
            for part in content.parts.as_deref().unwrap_or_default() {
                if let Some(text) = &part.text {
                    out.push_str(text);
                }
            }
        }
        out
    }
}

fn collect_streamed_text(raw: &str) -> Result<String, CompletionError> {
    let mut out = String::new();
    let mut saw_event = false;

    for line in raw.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }
        let chunk: GenerateContentResponse =
            serde_json::from_str(data).map_err(|error| CompletionError::MalformedResponse {
                message: format!("bad stream chunk: {error}"),
            })?;
        if let Some(reason) = chunk.blocked_reason() {
            return Err(CompletionError::AccessDenied {
                message: format!("content blocked: {reason}"),
            });
        }
        saw_event = true;
        out.push_str(&chunk.concatenated_text());
    }

    if saw_event {
        return Ok(out);
    }

    // Some deployments answer with a plain JSON body (or a JSON array of
    // chunks) instead of an event stream; accept both before giving up.
    let trimmed = raw.trim();
    let parsed: Vec<GenerateContentResponse> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|error| CompletionError::MalformedResponse {
            message: error.to_string(),
        })?
    } else {
        vec![
            serde_json::from_str(trimmed).map_err(|error| CompletionError::MalformedResponse {
                message: error.to_string(),
            })?,
        ]
    };

    for chunk in &parsed {
        if let Some(reason) = chunk.blocked_reason() {
            return Err(CompletionError::AccessDenied {
                message: format!("content blocked: {reason}"),
            });
        }
        out.push_str(&chunk.concatenated_text());
    }
    Ok(out)
}
