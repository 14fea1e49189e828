//! Deterministic transform from extracted chapter text to paragraph markup.
//! Always returns renderable markup; there are no failure modes.

use once_cell::sync::Lazy;
use regex::Regex;

static BLANK_LINE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid paragraph split regex"));

/// A line consisting only of break symbols, e.g. `* * *`, `◇◇◇`, `―――`.
static SCENE_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\s*◇◆†☆★※＊•·=＝~〜―─—\-]{3,}$").expect("valid scene break regex")
});

static EMPHASIS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\n]+)\*").expect("valid emphasis regex"));

pub const SCENE_BREAK_MARKUP: &str = r#"<p class="scene-break">* * *</p>"#;
pub const EMPTY_CHAPTER_MARKUP: &str = "<p><em>This chapter has no content.</em></p>";

/// Converts chapter text into paragraph markup: blank-line-delimited
/// paragraphs (with a line-grouping fallback), centered scene breaks,
/// `*word*` emphasis, and intra-paragraph line breaks preserved.
pub fn format_chapter_body(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return EMPTY_CHAPTER_MARKUP.to_string();
    }

    let blocks = if BLANK_LINE_SPLIT_RE.is_match(trimmed) {
        BLANK_LINE_SPLIT_RE
            .split(trimmed)
            .map(|block| block.trim().to_string())
            .filter(|block| !block.is_empty())
            .collect()
    } else {
        group_lines(trimmed)
    };

    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        if is_scene_break(&block) {
            out.push(SCENE_BREAK_MARKUP.to_string());
        } else {
            out.push(render_paragraph(&block));
        }
    }
    out.join("\n")
}

fn is_scene_break(block: &str) -> bool {
    !block.trim().is_empty() && SCENE_BREAK_RE.is_match(block.trim())
}

/// Grouping heuristic for text without blank-line structure: a new group
/// starts on an empty line, a scene-break line, or after a dialogue-like
/// line (one that closes a quotation).
fn group_lines(text: &str) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut groups, &mut current);
            continue;
        }
        if is_scene_break(trimmed) {
            flush(&mut groups, &mut current);
            groups.push(trimmed.to_string());
            continue;
        }
        current.push(trimmed);
        if is_dialogue_line(trimmed) {
            flush(&mut groups, &mut current);
        }
    }
    flush(&mut groups, &mut current);
    groups
}

fn flush(groups: &mut Vec<String>, current: &mut Vec<&str>) {
    if !current.is_empty() {
        groups.push(current.join("\n"));
        current.clear();
    }
}

fn is_dialogue_line(line: &str) -> bool {
    const CLOSERS: [char; 4] = ['」', '』', '”', '"'];
    line.chars()
        .next_back()
        .is_some_and(|last| CLOSERS.contains(&last))
}

fn render_paragraph(block: &str) -> String {
    let lines: Vec<String> = block
        .lines()
        .map(|line| {
            let escaped = html_escape::encode_text(line.trim()).into_owned();
            EMPHASIS_RE
                .replace_all(&escaped, "<em>${1}</em>")
                .into_owned()
        })
        .collect();
    format!("<p>{}</p>", lines.join("<br/>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_delimit_paragraphs() {
        let markup = format_chapter_body("Line one.\n\nLine two.");
        assert_eq!(markup, "<p>Line one.</p>\n<p>Line two.</p>");
    }

    #[test]
    fn scene_break_renders_as_centered_marker() {
        let markup = format_chapter_body("Before.\n\n* * *\n\nAfter.");
        let blocks: Vec<&str> = markup.lines().collect();
        assert_eq!(blocks[0], "<p>Before.</p>");
        assert_eq!(blocks[1], SCENE_BREAK_MARKUP);
        assert_eq!(blocks[2], "<p>After.</p>");
    }

    #[test]
    fn asterisk_emphasis_becomes_em() {
        let markup = format_chapter_body("He was *very* sure.");
        assert_eq!(markup, "<p>He was <em>very</em> sure.</p>");
    }

    #[test]
    fn intra_paragraph_line_breaks_are_preserved() {
        let markup = format_chapter_body("First line\nsecond line.\n\nNext.");
        assert_eq!(
            markup,
            "<p>First line<br/>second line.</p>\n<p>Next.</p>"
        );
    }

    #[test]
    fn fallback_grouping_splits_after_dialogue() {
        let text = "「行くぞ」\nHe stood up.\nThe door creaked.";
        let markup = format_chapter_body(text);
        let paragraphs = markup.matches("<p>").count();
        assert_eq!(paragraphs, 2);
        assert!(markup.starts_with("<p>「行くぞ」</p>"));
    }

    #[test]
    fn fallback_grouping_recognizes_scene_breaks() {
        let text = "One.\n◇◇◇\nTwo.";
        let markup = format_chapter_body(text);
        assert!(markup.contains(SCENE_BREAK_MARKUP));
        assert_eq!(markup.matches("<p").count(), 3);
    }

    #[test]
    fn empty_input_yields_placeholder() {
        assert_eq!(format_chapter_body("   \n  "), EMPTY_CHAPTER_MARKUP);
    }

    #[test]
    fn html_is_escaped() {
        let markup = format_chapter_body("a < b & c");
        assert_eq!(markup, "<p>a &lt; b &amp; c</p>");
    }
}
