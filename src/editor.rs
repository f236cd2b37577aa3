//! Composing user-authored templates.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::EditorError;
use crate::models::{Document, Keyword, TEMPLATE_EXTENSION, TemplateRecord, parse_document};
use crate::prompt::{Confirm, Resolution};

/// Working buffer of the template editor.
#[derive(Debug, Clone)]
pub struct TemplateDraft {
    name: String,
    content: String,
    keywords: Vec<Keyword>,
    saved: bool,
}

impl Default for TemplateDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            content: String::new(),
            keywords: Vec::new(),
            saved: true,
        }
    }
}

impl TemplateDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an existing template file into a fresh draft.
    pub fn open(path: &Path) -> Result<Self, EditorError> {
        let label = path.display().to_string();
        info!("opening template file {label}");
        let bytes = fs::read(path).map_err(|e| crate::error::LoadError::io(path, e))?;
        match parse_document(&bytes, &label)? {
            Document::Config(_) => Err(EditorError::NotATemplate(label)),
            Document::Template(doc) => {
                let record = doc.into_record();
                info!("opened template file: {}", record.name);
                Ok(Self {
                    name: record.name,
                    content: record.content,
                    keywords: record.keywords,
                    saved: true,
                })
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    /// `false` once anything changed since the last save, open or clear.
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.saved = false;
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.saved = false;
    }

    /// Adds a keyword, or updates the description of an existing one.
    pub fn add_keyword(&mut self, text: &str, description: &str) -> Result<(), EditorError> {
        if text.is_empty() || description.is_empty() {
            return Err(EditorError::EmptyKeyword);
        }
        match self.keywords.iter_mut().find(|k| k.text == text) {
            Some(existing) => existing.description = description.to_string(),
            None => self.keywords.push(Keyword {
                text: text.to_string(),
                description: description.to_string(),
            }),
        }
        info!("added keyword {text}({description})");
        self.saved = false;
        Ok(())
    }

    pub fn remove_keyword(&mut self, index: usize) -> Result<Keyword, EditorError> {
        if index >= self.keywords.len() {
            return Err(EditorError::NoSuchKeyword(index));
        }
        let removed = self.keywords.remove(index);
        info!("removed keyword {}({})", removed.text, removed.description);
        self.saved = false;
        Ok(removed)
    }

    /// Empties the draft and discards unsaved changes.
    pub fn clear(&mut self) {
        *self = Self::default();
        info!("template draft cleared");
    }

    pub fn to_record(&self) -> TemplateRecord {
        TemplateRecord::new(self.name.clone(), self.content.clone(), self.keywords.clone())
    }

    /// Document written by [`TemplateDraft::save`].
    pub fn to_json(&self) -> Value {
        json!({
            "Name": self.name,
            "Content": self.content,
            "Rolename": self.keywords.iter().map(|k| k.text.as_str()).collect::<Vec<_>>(),
            "RoleDes": self.keywords.iter().map(|k| k.description.as_str()).collect::<Vec<_>>(),
        })
    }

    /// Writes the draft into `dir`.
    ///
    /// Returns `None` when an existing file of the same name was found and
    /// the user chose not to save.
    pub fn save(&mut self, dir: &Path, prompt: &mut dyn Confirm) -> Result<Option<PathBuf>, EditorError> {
        if self.content.is_empty() {
            warn!("{}", EditorError::EmptyContent);
            return Err(EditorError::EmptyContent);
        }
        if self.name.is_empty() {
            self.name = format!("untitled_{}", timestamp());
        }

        fs::create_dir_all(dir).map_err(|source| EditorError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut path = dir.join(format!("{}{TEMPLATE_EXTENSION}", self.name));
        if path.exists() {
            let detail = format!("existing template: {}", path.display());
            match prompt.ask_resolution(
                "Template already exists",
                "A template with this name already exists. Overwrite it?",
                Some(&detail),
            ) {
                Resolution::Overwrite => {}
                Resolution::Rename => {
                    path = dir.join(format!("{}_custom_{}{TEMPLATE_EXTENSION}", self.name, timestamp()));
                }
                Resolution::Skip => {
                    info!("save cancelled, {} left untouched", path.display());
                    return Ok(None);
                }
            }
        }

        let body = serde_json::to_string_pretty(&self.to_json()).map_err(|e| EditorError::Io {
            path: path.clone(),
            source: e.into(),
        })?;
        fs::write(&path, body).map_err(|source| EditorError::Io {
            path: path.clone(),
            source,
        })?;
        self.saved = true;
        info!("template saved to {}", path.display());
        Ok(Some(path))
    }
}

fn timestamp() -> String {
    Local::now().format("%Y_%m_%d_%H_%M_%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader;
    use crate::prompt::testing::ScriptedPrompt;
    use crate::session::Session;

    fn draft() -> TemplateDraft {
        let mut draft = TemplateDraft::new();
        draft.set_name("Notice");
        draft.set_content("Dear WHO, see you at WHEN.");
        draft.add_keyword("WHO", "recipient").unwrap();
        draft.add_keyword("WHEN", "time").unwrap();
        draft
    }

    #[test]
    fn existing_keyword_updates_description_in_place() {
        let mut draft = draft();
        draft.add_keyword("WHO", "reader").unwrap();
        let descriptions: Vec<_> = draft.keywords().iter().map(|k| k.description.as_str()).collect();
        assert_eq!(descriptions, vec!["reader", "time"]);
    }

    #[test]
    fn empty_keyword_or_description_is_refused() {
        let mut draft = TemplateDraft::new();
        assert!(matches!(draft.add_keyword("", "x"), Err(EditorError::EmptyKeyword)));
        assert!(matches!(draft.add_keyword("X", ""), Err(EditorError::EmptyKeyword)));
        assert!(draft.is_saved());
    }

    #[test]
    fn removing_out_of_range_fails() {
        let mut draft = draft();
        assert!(matches!(draft.remove_keyword(5), Err(EditorError::NoSuchKeyword(5))));
        assert_eq!(draft.remove_keyword(0).unwrap().text, "WHO");
        assert_eq!(draft.keywords().len(), 1);
    }

    #[test]
    fn clear_resets_everything() {
        let mut draft = draft();
        assert!(!draft.is_saved());
        draft.clear();
        assert!(draft.is_saved());
        assert!(draft.name().is_empty() && draft.content().is_empty() && draft.keywords().is_empty());
    }

    #[test]
    fn saved_draft_loads_back_as_template() {
        let dir = tempfile::tempdir().unwrap();
        let mut draft = draft();
        let path = draft.save(dir.path(), &mut ScriptedPrompt::new()).unwrap().unwrap();
        assert!(draft.is_saved());
        assert_eq!(path.file_name().unwrap(), "Notice.json");

        let mut session = Session::new(dir.path());
        loader::load_dir(&mut session, &mut ScriptedPrompt::new()).unwrap();
        assert_eq!(session.store.get(0).unwrap(), &draft.to_record());
    }

    #[test]
    fn empty_content_cannot_be_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut draft = TemplateDraft::new();
        draft.set_name("x");
        assert!(matches!(
            draft.save(dir.path(), &mut ScriptedPrompt::new()),
            Err(EditorError::EmptyContent)
        ));
    }

    #[test]
    fn unnamed_draft_gets_a_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut draft = TemplateDraft::new();
        draft.set_content("body");
        let path = draft.save(dir.path(), &mut ScriptedPrompt::new()).unwrap().unwrap();
        assert!(draft.name().starts_with("untitled_"));
        assert!(path.exists());
    }

    #[test]
    fn name_collision_follows_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let mut draft = draft();
        draft.save(dir.path(), &mut ScriptedPrompt::new()).unwrap();

        let mut skip = ScriptedPrompt::with_resolutions([Resolution::Skip]);
        assert!(draft.save(dir.path(), &mut skip).unwrap().is_none());

        let mut rename = ScriptedPrompt::with_resolutions([Resolution::Rename]);
        let renamed = draft.save(dir.path(), &mut rename).unwrap().unwrap();
        let file_name = renamed.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with("Notice_custom_"));

        let mut overwrite = ScriptedPrompt::with_resolutions([Resolution::Overwrite]);
        let same = draft.save(dir.path(), &mut overwrite).unwrap().unwrap();
        assert_eq!(same.file_name().unwrap(), "Notice.json");
    }

    #[test]
    fn open_reads_template_and_rejects_config() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("t.json");
        fs::write(&template, r#"{"NAME": "T", "content": "c K", "rolename": ["K"], "roledes": ["k"]}"#).unwrap();
        let opened = TemplateDraft::open(&template).unwrap();
        assert_eq!(opened.name(), "T");
        assert_eq!(opened.keywords()[0].text, "K");
        assert!(opened.is_saved());

        let config = dir.path().join("c.json");
        fs::write(&config, r#"{"config": true, "version": "*"}"#).unwrap();
        assert!(matches!(TemplateDraft::open(&config), Err(EditorError::NotATemplate(_))));
    }
}
