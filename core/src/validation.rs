//! API key validation and model discovery against the Gemini endpoint: list
//! the key's `generateContent`-capable models, then probe one with a minimal
//! request so quota and plan problems surface before a long run starts.

use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use crate::ai::DEFAULT_BASE_URL;

static VALIDATION_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .expect("failed to build validation client")
});

const FALLBACK_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.5-flash-lite",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyValidationState {
    Valid,
    Unauthorized,
    Forbidden,
    NetworkError,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValidationResult {
    pub validation_status: KeyValidationState,
    pub models: Vec<String>,
}

pub async fn validate_api_key_and_list_models(
    api_key: &str,
    model_hint: Option<&str>,
) -> KeyValidationResult {
    validate_at(DEFAULT_BASE_URL, api_key, model_hint).await
}

pub async fn validate_at(
    base_url: &str,
    api_key: &str,
    model_hint: Option<&str>,
) -> KeyValidationResult {
    let trimmed_key = api_key.trim();
    if trimmed_key.is_empty() {
        return KeyValidationResult {
            validation_status: KeyValidationState::Unauthorized,
            models: Vec::new(),
        };
    }

    let models = match fetch_models(base_url, trimmed_key).await {
        Ok(list) => list,
        Err(status) => {
            return KeyValidationResult {
                validation_status: status,
                models: Vec::new(),
            };
        }
    };

    let Some(candidate) = pick_model_candidate(model_hint, &models) else {
        return KeyValidationResult {
            validation_status: KeyValidationState::NetworkError,
            models: Vec::new(),
        };
    };

    match probe_model(base_url, trimmed_key, &candidate).await {
        Ok(()) => {
            let mut merged = models;
            if !merged.iter().any(|entry| entry == &candidate) {
                merged.push(candidate);
            }
            KeyValidationResult {
                validation_status: KeyValidationState::Valid,
                models: dedupe_and_sort(merged),
            }
        }
        Err(status) => KeyValidationResult {
            validation_status: status,
            models: Vec::new(),
        },
    }
}

fn pick_model_candidate(model_hint: Option<&str>, models: &[String]) -> Option<String> {
    if let Some(hint) = model_hint {
        let trimmed = hint.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    if let Some(existing) = models.first() {
        if !existing.trim().is_empty() {
            return Some(existing.clone());
        }
    }

    FALLBACK_MODELS.first().map(|model| model.to_string())
}

async fn fetch_models(base_url: &str, api_key: &str) -> Result<Vec<String>, KeyValidationState> {
    let url = format!("{base_url}/v1beta/models?key={api_key}");
    let response = VALIDATION_CLIENT
        .get(url)
        .send()
        .await
        .map_err(|_| KeyValidationState::NetworkError)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(map_failure(status, &body));
    }

    let listing = response
        .json::<ModelList>()
        .await
        .map_err(|_| KeyValidationState::NetworkError)?;

    let models = listing
        .models
        .unwrap_or_default()
        .into_iter()
        .filter(|model| model.supports_generate_content())
        .filter_map(|model| model.normalized_name())
        .collect::<Vec<_>>();

    Ok(dedupe_and_sort(models))
}

async fn probe_model(
    base_url: &str,
    api_key: &str,
    model: &str,
) -> Result<(), KeyValidationState> {
    let normalized_model = if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    };
    let url = format!("{base_url}/v1beta/{normalized_model}:generateContent?key={api_key}");

    let response = VALIDATION_CLIENT
        .post(url)
        .json(&serde_json::json!({
            "contents": [{ "parts": [{ "text": "ping" }] }]
        }))
        .send()
        .await
        .map_err(|_| KeyValidationState::NetworkError)?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(map_failure(status, &body))
}

fn map_failure(status: StatusCode, body: &str) -> KeyValidationState {
    if status == StatusCode::UNAUTHORIZED {
        return KeyValidationState::Unauthorized;
    }
    if status == StatusCode::FORBIDDEN || status == StatusCode::NOT_FOUND {
        return KeyValidationState::Forbidden;
    }

    let lowered = body.to_ascii_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS && lowered.contains("quota") {
        return KeyValidationState::Forbidden;
    }

    KeyValidationState::NetworkError
}

fn dedupe_and_sort(models: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = models
        .into_iter()
        .map(|model| model.trim().to_string())
        .filter(|model| !model.is_empty())
        .collect();
    unique.sort();
    unique.dedup();
    unique
}

#[derive(Debug, serde::Deserialize)]
struct ModelList {
    models: Option<Vec<ModelEntry>>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    name: Option<String>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

impl ModelEntry {
    fn supports_generate_content(&self) -> bool {
        if self.supported_generation_methods.is_empty() {
            return true;
        }
        self.supported_generation_methods
            .iter()
            .any(|method| method.eq_ignore_ascii_case("generateContent"))
    }

    fn normalized_name(&self) -> Option<String> {
        let raw = self.name.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.strip_prefix("models/") {
            Some(stripped) if stripped.trim().is_empty() => None,
            Some(stripped) => Some(stripped.trim().to_string()),
            None => Some(raw.to_string()),
        }
    }
}
