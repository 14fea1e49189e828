//! Book Assembler boundary: ordered (title, body markup) pairs plus an
//! optional glossary section go in, EPUB bytes come out. The container
//! layout itself is `epub-builder`'s problem.

use crate::glossary::GlossaryCollection;
use anyhow::{anyhow, Result};
use epub_builder::{EpubBuilder, EpubContent, ReferenceType, ZipLibrary};

#[derive(Debug, Clone)]
pub struct BookMeta {
    pub title: String,
    pub author: String,
    pub publisher: String,
}

#[derive(Debug, Clone)]
pub struct BookChapter {
    pub title: String,
    pub body_markup: String,
}

/// Assembles the downloadable EPUB. Chapter order is taken as given; the
/// caller is responsible for sorting records by chapter number first.
pub fn assemble_epub(
    meta: &BookMeta,
    chapters: &[BookChapter],
    glossary: Option<&GlossaryCollection>,
) -> Result<Vec<u8>> {
    let zip = ZipLibrary::new().map_err(|e| anyhow!("epub zip init failed: {e}"))?;
    let mut builder = EpubBuilder::new(zip).map_err(|e| anyhow!("epub init failed: {e}"))?;

    builder
        .metadata("title", &meta.title)
        .map_err(|e| anyhow!("epub metadata failed: {e}"))?;
    builder
        .metadata("author", &meta.author)
        .map_err(|e| anyhow!("epub metadata failed: {e}"))?;
    if !meta.publisher.trim().is_empty() {
        builder
            .metadata("description", format!("Publisher: {}", meta.publisher))
            .map_err(|e| anyhow!("epub metadata failed: {e}"))?;
    }
    builder.inline_toc();

    for (index, chapter) in chapters.iter().enumerate() {
        let href = format!("chapter_{}.xhtml", index + 1);
        let document = wrap_xhtml(&chapter.title, &chapter.body_markup);
        builder
            .add_content(
                EpubContent::new(href, document.as_bytes())
                    .title(chapter.title.clone())
                    .reftype(ReferenceType::Text),
            )
            .map_err(|e| anyhow!("epub chapter failed: {e}"))?;
    }

    if let Some(collection) = glossary {
        let document = wrap_xhtml("Character Glossary", &glossary_markup(collection));
        builder
            .add_content(
                EpubContent::new("glossary.xhtml", document.as_bytes())
                    .title("Character Glossary")
                    .reftype(ReferenceType::Glossary),
            )
            .map_err(|e| anyhow!("epub glossary failed: {e}"))?;
    }

    let mut output = Vec::new();
    builder
        .generate(&mut output)
        .map_err(|e| anyhow!("epub generation failed: {e}"))?;
    Ok(output)
}

fn wrap_xhtml(title: &str, body: &str) -> String {
    let escaped_title = html_escape::encode_text(title);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>{escaped_title}</title>
  <style>p.scene-break {{ text-align: center; }}</style>
</head>
<body>
<h2>{escaped_title}</h2>
{body}
</body>
</html>
"#
    )
}

fn glossary_markup(collection: &GlossaryCollection) -> String {
    let mut out = String::new();
    for segment in &collection.segments {
        out.push_str(&format!(
            "<h3>Chapters {}-{}</h3>\n",
            segment.chapter_range.start, segment.chapter_range.end
        ));
        out.push_str("<dl>\n");
        for character in &segment.characters {
            out.push_str(&format!(
                "<dt>{} ({})</dt>\n",
                html_escape::encode_text(&character.english_name),
                html_escape::encode_text(&character.japanese_name)
            ));
            out.push_str(&format!(
                "<dd>[{}] {}</dd>\n",
                character.importance.as_str(),
                html_escape::encode_text(&character.description)
            ));
        }
        out.push_str("</dl>\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glossary::{ChapterRange, Character, GlossarySegment, Importance};
    use chrono::Utc;

    fn meta() -> BookMeta {
        BookMeta {
            title: "The Iron Keep".into(),
            author: "Unknown".into(),
            publisher: "Web Novel Translator".into(),
        }
    }

    fn chapters() -> Vec<BookChapter> {
        vec![
            BookChapter {
                title: "Chapter 1".into(),
                body_markup: "<p>One.</p>".into(),
            },
            BookChapter {
                title: "Chapter 2".into(),
                body_markup: "<p>Two.</p>".into(),
            },
        ]
    }

    fn glossary() -> GlossaryCollection {
        let now = Utc::now();
        GlossaryCollection {
            series_name: "The Iron Keep".into(),
            segments: vec![GlossarySegment {
                id: "segment-1".into(),
                characters: vec![Character {
                    id: "c1".into(),
                    japanese_name: "田中".into(),
                    english_name: "Tanaka".into(),
                    age: None,
                    gender: None,
                    height: None,
                    physical_appearance: None,
                    description: "A wary swordsman.".into(),
                    importance: Importance::Major,
                    occurrence_count: 3,
                    last_modified: now,
                }],
                series_name: "The Iron Keep".into(),
                chapter_range: ChapterRange { start: 1, end: 10 },
                segment_number: 1,
                generated_at: now,
                last_modified: now,
            }],
            total_chapter_range: ChapterRange { start: 1, end: 10 },
            created_at: now,
            last_modified: now,
        }
    }

    #[test]
    fn produces_a_zip_container() {
        let bytes = assemble_epub(&meta(), &chapters(), None).unwrap();
        // EPUBs are zip archives.
        assert!(bytes.starts_with(b"PK"));
        assert!(bytes.len() > 100);
    }

    #[test]
    fn glossary_section_is_accepted() {
        let with = assemble_epub(&meta(), &chapters(), Some(&glossary())).unwrap();
        let without = assemble_epub(&meta(), &chapters(), None).unwrap();
        assert!(with.len() > without.len());
    }

    #[test]
    fn glossary_markup_lists_characters() {
        let markup = glossary_markup(&glossary());
        assert!(markup.contains("<dt>Tanaka (田中)</dt>"));
        assert!(markup.contains("[major] A wary swordsman."));
        assert!(markup.contains("<h3>Chapters 1-10</h3>"));
    }

    #[test]
    fn xhtml_wrapper_escapes_the_title() {
        let document = wrap_xhtml("A < B", "<p>x</p>");
        assert!(document.contains("<title>A &lt; B</title>"));
        assert!(document.contains("<p>x</p>"));
    }
}
