//! The sequential translate-many-chapters loop: one isolated translation per
//! chapter, a bounded retry wrapper around each, a cancel flag checked
//! between chapters (never mid-request), and typed progress events for the
//! caller. A terminal failure stops the loop immediately and preserves every
//! chapter completed so far; the system never auto-skips a failed chapter,
//! because that would silently produce a book with a gap.

use crate::ai::retry::RetryPolicy;
use crate::ai::CompletionClient;
use crate::config::TranslationOptions;
use crate::site::Site;
use crate::state::ChapterRecord;
use crate::translator::{ChapterOutcome, ChapterRequest, ChapterSource, ChapterTranslator};
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;

pub const DEFAULT_INTER_CHAPTER_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgressEvent {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_requested: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStatus {
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay_seconds: f32,
    pub reason: String,
}

/// Receives progress events from a run. Implementations must be cheap; the
/// loop calls them inline.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ChapterProgressEvent);
}

pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ChapterProgressEvent) {}
}

#[derive(Debug, Clone)]
pub struct TranslationRunRequest {
    pub series_base_url: String,
    pub chapter_numbers: Vec<u32>,
    pub options: TranslationOptions,
    pub retry: RetryPolicy,
    pub inter_chapter_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    Terminal {
        chapter_number: u32,
        reason: String,
    },
    /// The model produced plausible content without the required markers;
    /// the raw text is kept for manual review.
    ContractViolation {
        chapter_number: u32,
        raw_text: String,
    },
}

#[derive(Debug)]
pub struct TranslationRunReport {
    pub status: RunStatus,
    pub completed: Vec<ChapterRecord>,
    pub failure: Option<RunFailure>,
    pub message: String,
}

/// The Retry Controller: wraps one chapter translation in a bounded retry
/// loop. Recoverable faults wait `policy.base_delay` and re-run with a
/// brand-new translation call; terminal faults and ambiguous successes are
/// returned immediately. The final result is never `RecoverableFailure`.
pub async fn translate_with_retry(
    client: &dyn CompletionClient,
    request: &ChapterRequest<'_>,
    policy: &RetryPolicy,
    sink: &dyn ProgressSink,
) -> ChapterOutcome {
    let translator = ChapterTranslator::new(client);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let reason = match translator.translate(request).await {
            ChapterOutcome::RecoverableFailure { reason } => reason,
            outcome => return outcome,
        };

        if attempts >= policy.max_attempts.max(1) {
            return ChapterOutcome::TerminalFailure {
                reason: format!("exhausted {attempts} attempts; last error: {reason}"),
            };
        }

        warn!(
            "chapter {} attempt {attempts} failed ({reason}); retrying",
            request.chapter_number
        );
        sink.emit(ChapterProgressEvent {
            status: "running".into(),
            progress_pct: None,
            chapter_number: Some(request.chapter_number),
            translated_count: None,
            total_count: None,
            log: Some(format!(
                "Chapter {} failed: {reason}. Retrying shortly.",
                request.chapter_number
            )),
            retry: Some(RetryStatus {
                attempt: attempts + 1,
                max_attempts: policy.max_attempts,
                delay_seconds: policy.base_delay.as_secs_f32(),
                reason: reason.clone(),
            }),
            cancel_requested: None,
        });
        sleep(policy.base_delay).await;
    }
}

/// Translates the requested chapters strictly in order. Stops at the first
/// terminal failure or contract violation, keeping all completed chapters
/// and naming the failing chapter so the caller can intervene manually.
pub async fn run_translation(
    client: &dyn CompletionClient,
    site: &dyn Site,
    run: &TranslationRunRequest,
    cancel: &AtomicBool,
    sink: &dyn ProgressSink,
) -> TranslationRunReport {
    let mut numbers = run.chapter_numbers.clone();
    numbers.sort_unstable();
    numbers.dedup();
    let total = numbers.len() as u32;
    let mut completed: Vec<ChapterRecord> = Vec::new();

    sink.emit(ChapterProgressEvent {
        status: "running".into(),
        progress_pct: Some(0.0),
        chapter_number: None,
        translated_count: Some(0),
        total_count: Some(total),
        log: Some("Starting translation run.".into()),
        retry: None,
        cancel_requested: None,
    });

    for &number in &numbers {
        if cancel.load(Ordering::SeqCst) {
            let message = format!(
                "Run canceled; {} of {total} chapters kept.",
                completed.len()
            );
            sink.emit(ChapterProgressEvent {
                status: "canceled".into(),
                progress_pct: Some(percentage(completed.len() as u32, total)),
                chapter_number: None,
                translated_count: Some(completed.len() as u32),
                total_count: Some(total),
                log: Some(message.clone()),
                retry: None,
                cancel_requested: Some(true),
            });
            return TranslationRunReport {
                status: RunStatus::Canceled,
                completed,
                failure: None,
                message,
            };
        }

        // Fixed inter-call pacing; see the external rate limits.
        sleep(run.inter_chapter_delay).await;

        let chapter_url = site.chapter_url(&run.series_base_url, number);
        let request = ChapterRequest {
            chapter_number: number,
            source: ChapterSource::Url(chapter_url),
            options: &run.options,
        };

        match translate_with_retry(client, &request, &run.retry, sink).await {
            ChapterOutcome::Success { text } => {
                info!("chapter {number} translated");
                completed.push(ChapterRecord {
                    chapter_number: number,
                    translated_text: text,
                });
                sink.emit(ChapterProgressEvent {
                    status: "running".into(),
                    progress_pct: Some(percentage(completed.len() as u32, total)),
                    chapter_number: Some(number),
                    translated_count: Some(completed.len() as u32),
                    total_count: Some(total),
                    log: Some(format!("Chapter {number} translated.")),
                    retry: None,
                    cancel_requested: None,
                });
            }
            ChapterOutcome::AmbiguousSuccess { raw_text } => {
                let message = format!(
                    "Chapter {number} returned content without the required markers; \
                     review it manually. {} chapters completed.",
                    completed.len()
                );
                sink.emit(failure_event(&message, number, completed.len() as u32, total));
                return TranslationRunReport {
                    status: RunStatus::Failed,
                    completed,
                    failure: Some(RunFailure::ContractViolation {
                        chapter_number: number,
                        raw_text,
                    }),
                    message,
                };
            }
            ChapterOutcome::TerminalFailure { reason }
            | ChapterOutcome::RecoverableFailure { reason } => {
                let message = format!(
                    "Chapter {number} failed: {reason}. {} chapters completed; \
                     supply the chapter manually to continue.",
                    completed.len()
                );
                sink.emit(failure_event(&message, number, completed.len() as u32, total));
                return TranslationRunReport {
                    status: RunStatus::Failed,
                    completed,
                    failure: Some(RunFailure::Terminal {
                        chapter_number: number,
                        reason,
                    }),
                    message,
                };
            }
        }
    }

    let message = format!("Translated {} of {total} chapters.", completed.len());
    sink.emit(ChapterProgressEvent {
        status: "completed".into(),
        progress_pct: Some(100.0),
        chapter_number: None,
        translated_count: Some(completed.len() as u32),
        total_count: Some(total),
        log: Some(message.clone()),
        retry: None,
        cancel_requested: None,
    });
    TranslationRunReport {
        status: RunStatus::Completed,
        completed,
        failure: None,
        message,
    }
}

/// Manual-override path: translates literal source text instead of a URL,
/// with the same retry discipline as the URL path.
pub async fn translate_direct_text(
    client: &dyn CompletionClient,
    chapter_number: u32,
    source_text: &str,
    options: &TranslationOptions,
    policy: &RetryPolicy,
) -> ChapterOutcome {
    let request = ChapterRequest {
        chapter_number,
        source: ChapterSource::Text(source_text.to_string()),
        options,
    };
    translate_with_retry(client, &request, policy, &NullSink).await
}

fn failure_event(
    message: &str,
    chapter_number: u32,
    completed: u32,
    total: u32,
) -> ChapterProgressEvent {
    ChapterProgressEvent {
        status: "failed".into(),
        progress_pct: Some(percentage(completed, total)),
        chapter_number: Some(chapter_number),
        translated_count: Some(completed),
        total_count: Some(total),
        log: Some(message.to_string()),
        retry: None,
        cancel_requested: None,
    }
}

fn percentage(processed: u32, total: u32) -> f32 {
    if total == 0 {
        return 0.0;
    }
    ((processed as f32) / (total as f32) * 100.0).clamp(0.0, 100.0)
}
