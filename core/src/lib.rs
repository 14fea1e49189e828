pub mod ai;
pub mod book;
pub mod config;
pub mod extractor;
pub mod formatter;
pub mod glossary;
pub mod jobs;
pub mod prompts;
pub mod site;
pub mod state;
pub mod storage;
pub mod translator;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use ai::{
    retry::RetryPolicy, CompletionClient, CompletionError, CompletionRequest, GeminiClient,
};
pub use book::{assemble_epub, BookChapter, BookMeta};
pub use config::{GlossaryBuildOptions, TranslationOptions};
pub use extractor::{extract_between_sentinels, ExtractOutcome};
pub use formatter::format_chapter_body;
pub use glossary::{
    Character, ChapterRange, GlossaryBuildReport, GlossaryBuilder, GlossaryCollection,
    GlossarySegment, Importance,
};
pub use jobs::{
    run_translation, translate_direct_text, translate_with_retry, ChapterProgressEvent,
    NullSink, ProgressSink, RunFailure, RunStatus, TranslationRunReport, TranslationRunRequest,
};
pub use site::{Site, SyosetuSite};
pub use state::{AppState, ChapterRecord, FormState};
pub use storage::JsonStore;
pub use translator::{ChapterOutcome, ChapterRequest, ChapterSource, ChapterTranslator};
pub use validation::{validate_api_key_and_list_models, KeyValidationResult, KeyValidationState};
