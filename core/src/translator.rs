use crate::ai::{CompletionClient, CompletionError, CompletionRequest};
use crate::config::TranslationOptions;
use crate::extractor::{extract_between_sentinels, ExtractOutcome};
use crate::prompts;

#[derive(Debug, Clone)]
pub enum ChapterSource {
    /// URL-context mode: the capability fetches the chapter itself.
    Url(String),
    /// Direct-text fallback: literal source-language content.
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ChapterRequest<'a> {
    pub chapter_number: u32,
    pub source: ChapterSource,
    pub options: &'a TranslationOptions,
}

/// The four-way result of one translation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterOutcome {
    Success { text: String },
    /// Plausible content without the required markers; surfaced for manual
    /// review, never auto-accepted or auto-retried.
    AmbiguousSuccess { raw_text: String },
    RecoverableFailure { reason: String },
    TerminalFailure { reason: String },
}

pub struct ChapterTranslator<'a> {
    client: &'a dyn CompletionClient,
}

impl<'a> ChapterTranslator<'a> {
    pub fn new(client: &'a dyn CompletionClient) -> Self {
        Self { client }
    }

    /// Runs one isolated completion call for one chapter. Every call builds a
    /// fresh request; nothing is carried over from other chapters or from
    /// earlier attempts, so chapters cannot cross-contaminate each other.
    pub async fn translate(&self, request: &ChapterRequest<'_>) -> ChapterOutcome {
        let (user_message, url_context) = match &request.source {
            ChapterSource::Url(url) => (prompts::chapter_user_message(url), true),
            ChapterSource::Text(text) => (prompts::direct_text_user_message(text), false),
        };

        let completion = CompletionRequest {
            model: request.options.model_id.clone(),
            system_instruction: prompts::chapter_system_instruction(
                request.options,
                request.chapter_number,
                url_context,
            ),
            user_message,
            url_context,
        };

        let raw = match self.client.complete(completion).await {
            Ok(raw) => raw,
            Err(error) => return classify_completion_error(error),
        };

        match extract_between_sentinels(&raw) {
            ExtractOutcome::Payload(text) => ChapterOutcome::Success { text },
            ExtractOutcome::Ambiguous(raw_text) => ChapterOutcome::AmbiguousSuccess { raw_text },
            ExtractOutcome::EmptyPayload => ChapterOutcome::RecoverableFailure {
                reason: "extracted content empty".into(),
            },
            ExtractOutcome::NoMarkers => ChapterOutcome::RecoverableFailure {
                reason: "no markers, not chapter-like".into(),
            },
        }
    }
}

fn classify_completion_error(error: CompletionError) -> ChapterOutcome {
    if error.is_terminal() {
        ChapterOutcome::TerminalFailure {
            reason: error.to_string(),
        }
    } else {
        ChapterOutcome::RecoverableFailure {
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedClient;

    fn options() -> TranslationOptions {
        TranslationOptions::default()
    }

    fn url_request<'a>(options: &'a TranslationOptions) -> ChapterRequest<'a> {
        ChapterRequest {
            chapter_number: 5,
            source: ChapterSource::Url("https://example.com/novel/5/".into()),
            options,
        }
    }

    #[tokio::test]
    async fn well_formed_reply_succeeds() {
        let client =
            ScriptedClient::new(vec![Ok("***TL_START***\nTitle [Chapter 5]\n\nBody.\n***TL_END***".into())]);
        let options = options();
        let outcome = ChapterTranslator::new(&client)
            .translate(&url_request(&options))
            .await;
        assert_eq!(
            outcome,
            ChapterOutcome::Success {
                text: "Title [Chapter 5]\n\nBody.".into()
            }
        );
    }

    #[tokio::test]
    async fn url_mode_requests_url_context() {
        let client =
            ScriptedClient::new(vec![Ok("***TL_START***\nTitle [Chapter 5]\nBody.\n***TL_END***".into())]);
        let options = options();
        ChapterTranslator::new(&client)
            .translate(&url_request(&options))
            .await;

        let captured = client.captured();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].url_context);
        assert!(captured[0].user_message.contains("https://example.com/novel/5/"));
        assert!(captured[0].system_instruction.contains("***TL_START***"));
    }

    #[tokio::test]
    async fn direct_text_mode_disables_url_context() {
        let client =
            ScriptedClient::new(vec![Ok("***TL_START***\nTitle [Chapter 5]\nBody.\n***TL_END***".into())]);
        let options = options();
        let request = ChapterRequest {
            chapter_number: 5,
            source: ChapterSource::Text("原文テキスト".into()),
            options: &options,
        };
        ChapterTranslator::new(&client).translate(&request).await;

        let captured = client.captured();
        assert!(!captured[0].url_context);
        assert!(captured[0].user_message.contains("原文テキスト"));
    }

    #[tokio::test]
    async fn empty_completion_is_terminal() {
        let client = ScriptedClient::new(vec![Err(CompletionError::EmptyResponse)]);
        let options = options();
        let outcome = ChapterTranslator::new(&client)
            .translate(&url_request(&options))
            .await;
        assert!(matches!(outcome, ChapterOutcome::TerminalFailure { .. }));
    }

    #[tokio::test]
    async fn markerless_chapter_like_reply_is_ambiguous() {
        let raw = "The Fall of the Keep [Chapter 5]\nA long scene follows.";
        let client = ScriptedClient::new(vec![Ok(raw.into())]);
        let options = options();
        let outcome = ChapterTranslator::new(&client)
            .translate(&url_request(&options))
            .await;
        match outcome {
            ChapterOutcome::AmbiguousSuccess { raw_text } => assert_eq!(raw_text, raw),
            other => panic!("expected ambiguous success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn short_markerless_reply_is_recoverable() {
        let client = ScriptedClient::new(vec![Ok("Sorry, I could not fetch that page.".into())]);
        let options = options();
        let outcome = ChapterTranslator::new(&client)
            .translate(&url_request(&options))
            .await;
        assert_eq!(
            outcome,
            ChapterOutcome::RecoverableFailure {
                reason: "no markers, not chapter-like".into()
            }
        );
    }
}
