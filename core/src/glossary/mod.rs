pub mod parser;

use crate::ai::retry::{backoff_retry, RetryPolicy};
use crate::ai::{CompletionClient, CompletionRequest};
use crate::config::GlossaryBuildOptions;
use crate::prompts;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::sleep;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Major,
    Minor,
    Background,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Major => "major",
            Importance::Minor => "minor",
            Importance::Background => "background",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "major" => Some(Importance::Major),
            "minor" => Some(Importance::Minor),
            "background" => Some(Importance::Background),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub japanese_name: String,
    /// Must stay stable once assigned; enforced only through prompt context.
    pub english_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_appearance: Option<String>,
    pub description: String,
    pub importance: Importance,
    pub occurrence_count: u32,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRange {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossarySegment {
    pub id: String,
    pub characters: Vec<Character>,
    pub series_name: String,
    pub chapter_range: ChapterRange,
    pub segment_number: u32,
    pub generated_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryCollection {
    pub series_name: String,
    pub segments: Vec<GlossarySegment>,
    pub total_chapter_range: ChapterRange,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl GlossaryCollection {
    /// Translation-context view: plain concatenation across segments. The
    /// same character may appear more than once; name discipline is the
    /// model's job, not ours.
    pub fn all_characters(&self) -> Vec<&Character> {
        self.segments
            .iter()
            .flat_map(|segment| segment.characters.iter())
            .collect()
    }

    /// Rendered roster suitable for `TranslationOptions::glossary_context`.
    pub fn as_translation_context(&self) -> String {
        prompts::glossary_context_lines(&self.all_characters())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSegment {
    pub chunk_index: usize,
    pub chapter_range: ChapterRange,
    pub reason: String,
}

#[derive(Debug)]
pub struct GlossaryBuildReport {
    pub collection: Option<GlossaryCollection>,
    pub segments_requested: usize,
    pub segments_succeeded: usize,
    pub skipped: Vec<SkippedSegment>,
    /// Derived from actual successful coverage, not the requested range, so
    /// callers can resume beyond it later.
    pub last_processed_chapter: Option<u32>,
    pub canceled: bool,
}

/// Renders the roster from all previously built segments as prompt context,
/// deduplicated by Japanese name (last sighting wins) and capped to bound
/// prompt size.
pub fn prior_character_context(segments: &[GlossarySegment], cap: usize) -> String {
    let mut order: Vec<&str> = Vec::new();
    let mut latest: Vec<(&Character, u32)> = Vec::new();

    for segment in segments {
        for character in &segment.characters {
            let name = character.japanese_name.as_str();
            if let Some(position) = order.iter().position(|seen| *seen == name) {
                latest[position] = (character, segment.segment_number);
            } else {
                order.push(name);
                latest.push((character, segment.segment_number));
            }
        }
    }

    let mut out = String::new();
    for (character, segment_number) in latest.into_iter().take(cap) {
        out.push_str("- ");
        out.push_str(&character.japanese_name);
        out.push_str(" => ");
        out.push_str(&character.english_name);
        out.push_str(" [");
        out.push_str(character.importance.as_str());
        out.push_str(&format!("] (last seen in segment {segment_number})"));
        if !character.description.trim().is_empty() {
            out.push_str(": ");
            out.push_str(character.description.trim());
        }
        out.push('\n');
    }
    out
}

pub struct GlossaryBuilder<'a> {
    client: &'a dyn CompletionClient,
    options: GlossaryBuildOptions,
}

impl<'a> GlossaryBuilder<'a> {
    pub fn new(client: &'a dyn CompletionClient, options: GlossaryBuildOptions) -> Self {
        Self { client, options }
    }

    /// Builds the glossary segment by segment, strictly in order: each
    /// segment's call sees the roster accumulated from every earlier one.
    /// Failed segments are skipped, not fatal; partial coverage beats none.
    pub async fn build(
        &self,
        series_name: &str,
        chapter_urls: &[String],
        range: ChapterRange,
        cancel: &AtomicBool,
    ) -> GlossaryBuildReport {
        let segment_size = self.options.segment_size.max(1);
        let chunks: Vec<&[String]> = chapter_urls.chunks(segment_size).collect();
        let policy = RetryPolicy::new(
            self.options.backoff_base(),
            self.options.backoff_cap(),
            self.options.max_rate_limit_retries,
        );

        let mut segments: Vec<GlossarySegment> = Vec::new();
        let mut skipped: Vec<SkippedSegment> = Vec::new();
        let mut canceled = false;

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                canceled = true;
                break;
            }

            let start = range.start + (chunk_index * segment_size) as u32;
            let end = (start + chunk.len() as u32 - 1).min(range.end);
            let chunk_range = ChapterRange { start, end };

            let context = prior_character_context(&segments, self.options.context_cap);
            let request = CompletionRequest {
                model: self.options.model_id.clone(),
                system_instruction: prompts::glossary_system_instruction(
                    series_name,
                    chunk_range,
                    (!context.is_empty()).then_some(context.as_str()),
                    self.options.max_characters_per_segment,
                    self.options.max_description_words,
                ),
                user_message: prompts::glossary_user_message(chunk),
                url_context: true,
            };

            match self.complete_with_backoff(request, &policy, chunk_range).await {
                Some(reply) => match parser::parse_characters(&reply) {
                    Some(characters) => {
                        let now = Utc::now();
                        let segment_number = segments.len() as u32 + 1;
                        info!(
                            "glossary segment {} built for chapters {}-{} ({} characters)",
                            segment_number,
                            chunk_range.start,
                            chunk_range.end,
                            characters.len()
                        );
                        segments.push(GlossarySegment {
                            id: Uuid::new_v4().to_string(),
                            characters,
                            series_name: series_name.to_string(),
                            chapter_range: chunk_range,
                            segment_number,
                            generated_at: now,
                            last_modified: now,
                        });
                    }
                    None => {
                        warn!(
                            "glossary reply for chapters {}-{} was unparseable; skipping segment",
                            chunk_range.start, chunk_range.end
                        );
                        skipped.push(SkippedSegment {
                            chunk_index,
                            chapter_range: chunk_range,
                            reason: "unparseable reply".into(),
                        });
                    }
                },
                None => {
                    skipped.push(SkippedSegment {
                        chunk_index,
                        chapter_range: chunk_range,
                        reason: "completion failed".into(),
                    });
                }
            }

            if chunk_index + 1 < chunks.len() {
                sleep(self.options.inter_segment_delay()).await;
            }
        }

        let segments_succeeded = segments.len();
        let last_processed_chapter = if segments_succeeded > 0 {
            Some(
                (range.start + (segments_succeeded * segment_size) as u32 - 1)
                    .min(range.end),
            )
        } else {
            None
        };

        let collection = if segments_succeeded > 0 {
            let now = Utc::now();
            Some(GlossaryCollection {
                series_name: series_name.to_string(),
                segments,
                total_chapter_range: range,
                created_at: now,
                last_modified: now,
            })
        } else {
            None
        };

        GlossaryBuildReport {
            collection,
            segments_requested: chunks.len(),
            segments_succeeded,
            skipped,
            last_processed_chapter,
            canceled,
        }
    }

    async fn complete_with_backoff(
        &self,
        request: CompletionRequest,
        policy: &RetryPolicy,
        chunk_range: ChapterRange,
    ) -> Option<String> {
        let mut retries = 0u32;
        loop {
            match self.client.complete(request.clone()).await {
                Ok(reply) => return Some(reply),
                Err(error) => {
                    let decision = backoff_retry(&error, policy, retries);
                    if !decision.should_retry {
                        warn!(
                            "glossary call for chapters {}-{} failed: {error}; skipping segment",
                            chunk_range.start, chunk_range.end
                        );
                        return None;
                    }
                    retries += 1;
                    warn!(
                        "glossary call for chapters {}-{} rate limited; retry {retries} in {:?}",
                        chunk_range.start, chunk_range.end, decision.delay
                    );
                    sleep(decision.delay).await;
                }
            }
        }
    }
}
