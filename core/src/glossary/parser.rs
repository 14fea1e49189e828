//! Turns the model's loosely structured glossary reply into a validated
//! character roster. The model is asked for JSON but is not a guaranteed
//! valid JSON emitter, so parsing degrades through two tiers: repair the
//! whole object, then salvage just the `characters` array. Each repair
//! heuristic is its own pure function so coverage gaps stay visible.

use super::{Character, Importance};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use uuid::Uuid;

static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:[jJ][sS][oO][nN])?\s*(.*?)\s*```").expect("valid fence regex")
});

static TRAILING_COMMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("valid trailing comma regex"));

/// The model sometimes writes `"word"s"` where it meant `"word's"`.
static STRAY_QUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Za-z])"s([\s".,;!?])"#).expect("valid stray quote regex"));

static SOURCE_SCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{Hiragana}\p{Katakana}\p{Han}々〆ヶー]+").expect("valid script regex")
});

/// Parses a glossary reply into a character roster, or `None` when both
/// repair tiers fail and the segment should be skipped.
pub fn parse_characters(raw: &str) -> Option<Vec<Character>> {
    let unfenced = strip_code_fences(raw);

    if let Some(object_text) = slice_outer_braces(&unfenced) {
        let repaired = repair_json(&object_text);
        if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
            if let Some(characters) = characters_from_value(&value) {
                return Some(characters);
            }
        }
    }

    // Narrow tier: tolerate corruption outside the array of interest.
    let array_text = extract_characters_array(&unfenced)?;
    let repaired = repair_json(&array_text);
    let wrapped = format!("{{\"characters\":{repaired}}}");
    let value = serde_json::from_str::<Value>(&wrapped).ok()?;
    characters_from_value(&value)
}

fn repair_json(text: &str) -> String {
    let collapsed = collapse_line_breaks(text);
    let without_commas = strip_trailing_commas(&collapsed);
    fix_stray_quotes(&without_commas)
}

/// Returns the contents of the first fenced block, or the input unchanged.
pub fn strip_code_fences(text: &str) -> String {
    match CODE_FENCE_RE.captures(text) {
        Some(captures) => captures[1].to_string(),
        None => text.trim().to_string(),
    }
}

/// Discards everything outside the outermost braces.
pub fn slice_outer_braces(text: &str) -> Option<String> {
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    (last > first).then(|| text[first..=last].to_string())
}

pub fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA_RE.replace_all(text, "${1}").into_owned()
}

/// Raw line breaks inside string values are invalid JSON; flattening all of
/// them is harmless elsewhere since JSON ignores whitespace between tokens.
pub fn collapse_line_breaks(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

pub fn fix_stray_quotes(text: &str) -> String {
    STRAY_QUOTE_RE.replace_all(text, "${1}'s${2}").into_owned()
}

/// Finds the `"characters": [...]` array by bracket depth, skipping brackets
/// inside string literals.
pub fn extract_characters_array(text: &str) -> Option<String> {
    let key_position = text.find("\"characters\"")?;
    let after_key = &text[key_position..];
    let open_offset = after_key.find('[')?;
    let array = &after_key[open_offset..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (index, ch) in array.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(array[..=index].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Removes stray source-script characters leaking into English text.
pub fn scrub_source_script(text: &str) -> String {
    let stripped = SOURCE_SCRIPT_RE.replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn characters_from_value(value: &Value) -> Option<Vec<Character>> {
    let entries = value.get("characters")?.as_array()?;
    let mut characters = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let Some(object) = entry.as_object() else {
            continue;
        };

        let japanese_name = string_field(object, "japaneseName").unwrap_or_default();
        let english_name = string_field(object, "englishName").unwrap_or_else(|| {
            if japanese_name.is_empty() {
                format!("Character {}", index + 1)
            } else {
                japanese_name.clone()
            }
        });
        let importance = string_field(object, "importance")
            .and_then(|raw| Importance::parse(&raw))
            .unwrap_or(Importance::Minor);
        let occurrence_count = object
            .get("occurrenceCount")
            .and_then(Value::as_u64)
            .map(|count| count.clamp(1, u64::from(u32::MAX)) as u32)
            .unwrap_or(1);
        let description =
            scrub_source_script(&string_field(object, "description").unwrap_or_default());

        characters.push(Character {
            id: Uuid::new_v4().to_string(),
            japanese_name,
            english_name,
            age: string_field(object, "age"),
            gender: string_field(object, "gender"),
            height: string_field(object, "height"),
            physical_appearance: string_field(object, "physicalAppearance"),
            description,
            importance,
            occurrence_count,
            last_modified: Utc::now(),
        });
    }

    Some(characters)
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
