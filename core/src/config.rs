/// Option records shared across the translation and glossary pipelines.
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationOptions {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    /// Rendered character roster injected into the system instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glossary_context: Option<String>,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            model_id: "gemini-2.5-flash".into(),
            series_name: None,
            glossary_context: None,
        }
    }
}

impl TranslationOptions {
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to parse options: {}", e))
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Failed to serialize options: {}", e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryBuildOptions {
    pub model_id: String,
    pub segment_size: usize,
    /// Cap on prior-character context entries injected per segment call.
    pub context_cap: usize,
    pub max_characters_per_segment: usize,
    pub max_description_words: usize,
    /// Retries allowed per segment on rate-limit faults.
    pub max_rate_limit_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub inter_segment_delay_ms: u64,
    /// Used instead of `inter_segment_delay_ms` for stricter-rate-limit model
    /// variants.
    pub strict_inter_segment_delay_ms: u64,
}

impl Default for GlossaryBuildOptions {
    fn default() -> Self {
        Self {
            model_id: "gemini-2.5-flash".into(),
            segment_size: 10,
            context_cap: 30,
            max_characters_per_segment: 15,
            max_description_words: 40,
            max_rate_limit_retries: 3,
            backoff_base_ms: 2_000,
            backoff_cap_ms: 32_000,
            inter_segment_delay_ms: 5_000,
            strict_inter_segment_delay_ms: 10_000,
        }
    }
}

impl GlossaryBuildOptions {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    /// The "pro" variants run on stricter free-tier rate limits.
    pub fn inter_segment_delay(&self) -> Duration {
        if self.model_id.to_ascii_lowercase().contains("pro") {
            Duration::from_millis(self.strict_inter_segment_delay_ms)
        } else {
            Duration::from_millis(self.inter_segment_delay_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = TranslationOptions::default();
        assert_eq!(options.model_id, "gemini-2.5-flash");
        assert!(options.series_name.is_none());

        let glossary = GlossaryBuildOptions::default();
        assert_eq!(glossary.segment_size, 10);
        assert_eq!(glossary.context_cap, 30);
    }

    #[test]
    fn test_json_round_trip() {
        let options = TranslationOptions {
            model_id: "gemini-2.5-pro".into(),
            series_name: Some("Iron Keep".into()),
            glossary_context: None,
        };
        let json = options.to_json().unwrap();
        let parsed = TranslationOptions::from_json(&json).unwrap();
        assert_eq!(parsed.model_id, options.model_id);
        assert_eq!(parsed.series_name, options.series_name);
    }

    #[test]
    fn test_strict_variant_gets_longer_delay() {
        let mut options = GlossaryBuildOptions::default();
        assert_eq!(options.inter_segment_delay(), Duration::from_millis(5_000));

        options.model_id = "gemini-2.5-pro".into();
        assert_eq!(options.inter_segment_delay(), Duration::from_millis(10_000));
    }
}
