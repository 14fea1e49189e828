use once_cell::sync::Lazy;
use regex::Regex;

/// Start-sentinel spellings the model is known to drift between.
pub const START_SENTINELS: [&str; 4] = [
    "***TL_START***",
    "***TL START***",
    "[TL_START]",
    "***START***",
];

/// End-sentinel spellings, matched against the *last* occurrence because the
/// payload itself may contain marker-like text.
pub const END_SENTINELS: [&str; 4] = ["***TL_END***", "***TL END***", "[TL_END]", "***END***"];

/// Marker-less text shorter than this is not treated as a plausible chapter.
pub const MIN_CHAPTER_LIKE_LEN: usize = 500;

static START_RE: Lazy<Regex> = Lazy::new(|| sentinel_regex(&START_SENTINELS));
static END_RE: Lazy<Regex> = Lazy::new(|| sentinel_regex(&END_SENTINELS));

fn sentinel_regex(variants: &[&str]) -> Regex {
    let pattern = variants
        .iter()
        .map(|variant| regex::escape(variant))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){pattern}")).expect("valid sentinel regex")
}

/// A translated chapter title line: free text followed by a bracketed
/// chapter-number tag, e.g. `The Long Road [Chapter 12]`.
static CHAPTER_TITLE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[^\n]{0,120}\[\s*chapter\s+\d+\s*\][^\n]*$")
        .expect("valid chapter title regex")
});

static CHAPTER_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[\s*chapter\s+\d+\s*\]").expect("valid chapter tag regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Payload found between (or recovered up to) the sentinels.
    Payload(String),
    /// No usable markers, but the text looks like a chapter; a human should
    /// decide whether to keep it.
    Ambiguous(String),
    /// Markers present but nothing between them.
    EmptyPayload,
    /// No markers and the text is not chapter-like.
    NoMarkers,
}

/// Locates the payload between the sentinel markers, or attempts a
/// best-effort recovery when the model dropped part of the envelope.
pub fn extract_between_sentinels(raw: &str) -> ExtractOutcome {
    let start = START_RE.find(raw);
    let end = END_RE.find_iter(raw).last();

    if let (Some(start), Some(end)) = (&start, &end) {
        if end.start() > start.end() {
            let payload = raw[start.end()..end.start()].trim();
            return if payload.is_empty() {
                ExtractOutcome::EmptyPayload
            } else {
                ExtractOutcome::Payload(payload.to_string())
            };
        }
    }

    // Start sentinel missing: the model often still emits the title line and
    // the closing sentinel, so recover everything from the title line on.
    if start.is_none() {
        if let Some(end) = &end {
            let preceding = &raw[..end.start()];
            if let Some(title) = CHAPTER_TITLE_LINE_RE.find(preceding) {
                let payload = preceding[title.start()..].trim();
                return if payload.is_empty() {
                    ExtractOutcome::EmptyPayload
                } else {
                    ExtractOutcome::Payload(payload.to_string())
                };
            }
        }
    }

    let trimmed = raw.trim();
    if CHAPTER_TAG_RE.is_match(trimmed) || trimmed.chars().count() >= MIN_CHAPTER_LIKE_LEN {
        ExtractOutcome::Ambiguous(trimmed.to_string())
    } else {
        ExtractOutcome::NoMarkers
    }
}
