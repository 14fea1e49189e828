//! System-instruction builders. The wording here *is* the response contract:
//! the extractor and the glossary parser both depend on what is promised in
//! these prompts.

use crate::config::TranslationOptions;
use crate::extractor::{END_SENTINELS, START_SENTINELS};
use crate::glossary::{ChapterRange, Character};

/// Builds the system instruction for a single chapter translation call.
pub fn chapter_system_instruction(
    options: &TranslationOptions,
    chapter_number: u32,
    source_is_url: bool,
) -> String {
    let start = START_SENTINELS[0];
    let end = END_SENTINELS[0];

    let mut sections = Vec::new();
    sections.push(
        "You are a professional translator of Japanese web novels into natural, fluent English.\n\
         Translate the chapter faithfully. Keep honorifics (-san, -sama, -kun) where they carry\n\
         meaning, and keep character name romanizations consistent."
            .to_string(),
    );

    if let Some(series) = options
        .series_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
    {
        sections.push(format!("Series: {}", series.trim()));
    }

    if let Some(glossary) = options
        .glossary_context
        .as_deref()
        .filter(|context| !context.trim().is_empty())
    {
        sections.push(format!(
            "Character glossary. Use these English names and spellings exactly:\n{glossary}"
        ));
    }

    sections.push(format!(
        "Formatting rules:\n\
         - First payload line: the translated chapter title followed by [Chapter {chapter_number}].\n\
         - Separate paragraphs with one blank line.\n\
         - Render scene breaks as a line containing only * * *.\n\
         - Mark emphasis as *word*.\n\
         - Last payload line: {source_line}.",
        source_line = if source_is_url {
            "the source URL"
        } else {
            "the text (manual source)"
        }
    ));

    sections.push(format!(
        "Respond with EXACTLY this envelope and nothing outside it:\n\
         {start}\n\
         <translated chapter>\n\
         {end}\n\
         The very first line of your reply must be {start} and the very last line must be {end},\n\
         each on its own line."
    ));

    sections.join("\n\n")
}

/// User message for the direct-text fallback path.
pub fn direct_text_user_message(source_text: &str) -> String {
    format!("Translate the following chapter text:\n\n{source_text}")
}

/// User message for URL-context mode.
pub fn chapter_user_message(chapter_url: &str) -> String {
    format!("Fetch and translate the chapter at this URL: {chapter_url}")
}

/// Builds the system instruction for one glossary segment call. `prior`
/// carries the roster extracted from all previously built segments.
pub fn glossary_system_instruction(
    series_name: &str,
    range: ChapterRange,
    prior_context: Option<&str>,
    max_characters: usize,
    max_description_words: usize,
) -> String {
    let mut sections = Vec::new();
    sections.push(format!(
        "You are building a character glossary for the web novel \"{series_name}\".\n\
         Read chapters {} through {} and identify the characters who appear in them.",
        range.start, range.end
    ));

    sections.push(format!(
        "Reply with ONLY a JSON object, no code fences and no commentary, in this exact shape:\n\
         {{\"characters\":[{{\"japaneseName\":\"...\",\"englishName\":\"...\",\"age\":\"...\",\
         \"gender\":\"...\",\"height\":\"...\",\"physicalAppearance\":\"...\",\
         \"description\":\"...\",\"importance\":\"major|minor|background\",\"occurrenceCount\":1}}]}}\n\
         List at most {max_characters} characters. Keep each description under \
         {max_description_words} words and written in English only."
    ));

    if let Some(context) = prior_context.filter(|context| !context.trim().is_empty()) {
        sections.push(format!(
            "Characters already identified in earlier chapters. Reuse their English names and\n\
             spellings exactly; include them again only if these chapters add new information:\n\
             {context}"
        ));
    }

    sections.join("\n\n")
}

/// User message for a glossary segment: the chapter URLs to read.
pub fn glossary_user_message(chapter_urls: &[String]) -> String {
    let mut message = String::from("Build the glossary from these chapters:\n");
    for url in chapter_urls {
        message.push_str(url);
        message.push('\n');
    }
    message
}

/// Renders a character roster as translation context, one line per character.
pub fn glossary_context_lines(characters: &[&Character]) -> String {
    let mut out = String::new();
    for character in characters {
        out.push_str("- ");
        out.push_str(&character.japanese_name);
        out.push_str(" => ");
        out.push_str(&character.english_name);
        out.push_str(" [");
        out.push_str(character.importance.as_str());
        out.push(']');
        if !character.description.trim().is_empty() {
            out.push_str(": ");
            out.push_str(character.description.trim());
        }
        out.push('\n');
    }
    out
}
