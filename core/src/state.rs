//! Explicit application state, threaded by reference through operations and
//! persisted through the key-value collaborator on every mutation. Nothing
//! in the pipeline reads ambient globals.

use crate::glossary::GlossaryCollection;
use crate::storage::JsonStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};

const FORM_KEY: &str = "form";
const CHAPTERS_KEY: &str = "chapters";
const GLOSSARY_KEY: &str = "glossary";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecord {
    pub chapter_number: u32,
    pub translated_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    #[serde(default)]
    pub series_name: String,
    #[serde(default)]
    pub series_base_url: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub chapter_start: u32,
    #[serde(default)]
    pub chapter_end: u32,
}

#[derive(Debug, Default)]
pub struct AppState {
    pub form: FormState,
    chapters: Vec<ChapterRecord>,
    pub glossary: Option<GlossaryCollection>,
}

impl AppState {
    pub fn load(store: &JsonStore) -> Self {
        let mut state = Self {
            form: store.load(FORM_KEY, FormState::default()),
            chapters: store.load(CHAPTERS_KEY, Vec::new()),
            glossary: store.load(GLOSSARY_KEY, None),
        };
        state.sort_chapters();
        state
    }

    /// Chapters in chapter-number order; insertion order never matters.
    pub fn chapters(&self) -> &[ChapterRecord] {
        &self.chapters
    }

    pub fn chapter(&self, chapter_number: u32) -> Option<&ChapterRecord> {
        self.chapters
            .iter()
            .find(|record| record.chapter_number == chapter_number)
    }

    /// Inserts or replaces the record for its chapter number.
    pub fn upsert_chapter(&mut self, store: &JsonStore, record: ChapterRecord) -> Result<()> {
        self.chapters
            .retain(|existing| existing.chapter_number != record.chapter_number);
        self.chapters.push(record);
        self.sort_chapters();
        store.save(CHAPTERS_KEY, &self.chapters)
    }

    pub fn edit_chapter(
        &mut self,
        store: &JsonStore,
        chapter_number: u32,
        translated_text: String,
    ) -> Result<bool> {
        let Some(record) = self
            .chapters
            .iter_mut()
            .find(|record| record.chapter_number == chapter_number)
        else {
            return Ok(false);
        };
        record.translated_text = translated_text;
        store.save(CHAPTERS_KEY, &self.chapters)?;
        Ok(true)
    }

    pub fn delete_chapter(&mut self, store: &JsonStore, chapter_number: u32) -> Result<bool> {
        let before = self.chapters.len();
        self.chapters
            .retain(|record| record.chapter_number != chapter_number);
        if self.chapters.len() == before {
            return Ok(false);
        }
        store.save(CHAPTERS_KEY, &self.chapters)?;
        Ok(true)
    }

    pub fn set_form(&mut self, store: &JsonStore, form: FormState) -> Result<()> {
        self.form = form;
        store.save(FORM_KEY, &self.form)
    }

    pub fn set_glossary(
        &mut self,
        store: &JsonStore,
        glossary: Option<GlossaryCollection>,
    ) -> Result<()> {
        self.glossary = glossary;
        store.save(GLOSSARY_KEY, &self.glossary)
    }

    /// Full reset: in-memory state and every persisted record.
    pub fn reset(&mut self, store: &JsonStore) -> Result<()> {
        self.form = FormState::default();
        self.chapters.clear();
        self.glossary = None;
        store.clear_all()
    }

    fn sort_chapters(&mut self) {
        self.chapters.sort_by_key(|record| record.chapter_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path().join("store"));
        (dir, store)
    }

    fn record(number: u32, text: &str) -> ChapterRecord {
        ChapterRecord {
            chapter_number: number,
            translated_text: text.into(),
        }
    }

    #[test]
    fn upsert_keeps_chapters_unique_and_sorted() {
        let (_dir, store) = store();
        let mut state = AppState::default();

        state.upsert_chapter(&store, record(3, "three")).unwrap();
        state.upsert_chapter(&store, record(1, "one")).unwrap();
        state.upsert_chapter(&store, record(3, "three again")).unwrap();

        let numbers: Vec<u32> = state
            .chapters()
            .iter()
            .map(|r| r.chapter_number)
            .collect();
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(state.chapter(3).unwrap().translated_text, "three again");
    }

    #[test]
    fn mutations_persist_across_loads() {
        let (_dir, store) = store();
        let mut state = AppState::default();
        state.upsert_chapter(&store, record(2, "two")).unwrap();
        state
            .set_form(
                &store,
                FormState {
                    series_name: "Iron Keep".into(),
                    series_base_url: "https://example.com/n1".into(),
                    model_id: "gemini-2.5-flash".into(),
                    chapter_start: 1,
                    chapter_end: 25,
                },
            )
            .unwrap();

        let reloaded = AppState::load(&store);
        assert_eq!(reloaded.chapters().len(), 1);
        assert_eq!(reloaded.form.series_name, "Iron Keep");
    }

    #[test]
    fn edit_and_delete_report_whether_the_chapter_existed() {
        let (_dir, store) = store();
        let mut state = AppState::default();
        state.upsert_chapter(&store, record(1, "one")).unwrap();

        assert!(state.edit_chapter(&store, 1, "revised".into()).unwrap());
        assert!(!state.edit_chapter(&store, 9, "nope".into()).unwrap());
        assert_eq!(state.chapter(1).unwrap().translated_text, "revised");

        assert!(state.delete_chapter(&store, 1).unwrap());
        assert!(!state.delete_chapter(&store, 1).unwrap());
    }

    #[test]
    fn reset_clears_memory_and_disk() {
        let (_dir, store) = store();
        let mut state = AppState::default();
        state.upsert_chapter(&store, record(1, "one")).unwrap();
        state.reset(&store).unwrap();

        assert!(state.chapters().is_empty());
        let reloaded = AppState::load(&store);
        assert!(reloaded.chapters().is_empty());
        assert_eq!(reloaded.form, FormState::default());
    }
}
