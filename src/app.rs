use std::fs;
use std::path::Path;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use keyplate::commands::{self, Command};
use keyplate::editor::TemplateDraft;
use keyplate::error::{EditorError, SubstituteError};
use keyplate::logging::LogBuffer;
use keyplate::models::{Keyword, Release};
use keyplate::session::Session;
use tracing::info;

#[derive(Debug, PartialEq)]
pub enum InputMode {
    Normal,
    Search,
    Replacement,
    CustomKeyword,
    ImportPath,
    /// Typing directly into the output pane.
    OutputEdit,
    DraftName,
    DraftContent,
    DraftKeyword,
    DraftDescription,
    DraftOpenPath,
}

#[derive(Debug, PartialEq)]
pub enum Focus {
    Templates,
    Keywords,
}

/// State of the template editor screen.
pub struct Editor {
    pub draft: TemplateDraft,
    pub keyword_index: usize,
    /// Keyword text waiting for its description.
    pub pending_keyword: Option<String>,
}

impl Editor {
    fn new(draft: TemplateDraft) -> Self {
        Self {
            draft,
            keyword_index: 0,
            pending_keyword: None,
        }
    }
}

/// Front-end state wrapped around the core session.
pub struct App {
    pub session: Session,
    /// Store indices of the templates matching the current search query.
    pub filtered_templates: Vec<usize>,
    /// Current index in the filtered templates list.
    pub highlighted_index: usize,
    /// Current index in the selected template's keyword list.
    pub keyword_index: usize,
    pub search_query: String,
    /// Text being typed in the replacement, custom keyword or import field.
    pub input: String,
    pub input_mode: InputMode,
    pub focus: Focus,
    /// Keyword typed by the user that takes precedence over the list.
    pub custom_keyword: Option<String>,
    /// Content of the output pane.
    pub output: String,
    pub output_scroll: u16,
    pub error: Option<String>,
    pub notification: Option<String>,
    pub matcher: SkimMatcherV2,
    pub logs: LogBuffer,
    pub show_debug: bool,
    /// Release offered by the last update check.
    pub pending_update: Option<Release>,
    /// Open while the template editor is shown.
    pub editor: Option<Editor>,
}

impl App {
    pub fn new(session: Session, logs: LogBuffer, show_debug: bool) -> Self {
        Self {
            session,
            filtered_templates: Vec::new(),
            highlighted_index: 0,
            keyword_index: 0,
            search_query: String::new(),
            input: String::new(),
            input_mode: InputMode::Normal,
            focus: Focus::Templates,
            custom_keyword: None,
            output: String::new(),
            output_scroll: 0,
            error: None,
            notification: None,
            matcher: SkimMatcherV2::default(),
            logs,
            show_debug,
            pending_update: None,
            editor: None,
        }
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.error = None;
        self.notification = Some(message.into());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.notification = None;
        self.error = Some(message.into());
    }

    pub fn clear_status(&mut self) {
        self.error = None;
        self.notification = None;
    }

    /// Call after the store was reloaded or extended.
    pub fn on_store_changed(&mut self) {
        if self.session.selected().is_none() {
            self.output.clear();
            self.custom_keyword = None;
            self.keyword_index = 0;
        }
        if self.session.configs.debug_enabled() {
            self.show_debug = true;
        }
        self.apply_filter();
    }

    pub fn apply_filter(&mut self) {
        let records = self.session.store.records();
        if self.search_query.is_empty() {
            self.filtered_templates = (0..records.len()).collect();
        } else {
            let mut matches: Vec<(i64, usize)> = records
                .iter()
                .enumerate()
                .filter_map(|(i, r)| {
                    self.matcher
                        .fuzzy_match(&r.name, &self.search_query)
                        .map(|score| (score, i))
                })
                .collect();

            matches.sort_by(|a, b| b.0.cmp(&a.0));
            self.filtered_templates = matches.into_iter().map(|(_, i)| i).collect();
        }

        if self.highlighted_index >= self.filtered_templates.len()
            && !self.filtered_templates.is_empty()
        {
            self.highlighted_index = self.filtered_templates.len() - 1;
        } else if self.filtered_templates.is_empty() {
            self.highlighted_index = 0;
        }
    }

    fn keyword_count(&self) -> usize {
        self.session.selected().map_or(0, |t| t.keywords.len())
    }

    pub fn next(&mut self) {
        match self.focus {
            Focus::Templates => {
                if !self.filtered_templates.is_empty() {
                    self.highlighted_index = (self.highlighted_index + 1) % self.filtered_templates.len();
                }
            }
            Focus::Keywords => {
                let count = self.keyword_count();
                if count > 0 {
                    self.keyword_index = (self.keyword_index + 1) % count;
                    self.custom_keyword = None;
                }
            }
        }
    }

    pub fn previous(&mut self) {
        match self.focus {
            Focus::Templates => {
                if !self.filtered_templates.is_empty() {
                    if self.highlighted_index > 0 {
                        self.highlighted_index -= 1;
                    } else {
                        self.highlighted_index = self.filtered_templates.len() - 1;
                    }
                }
            }
            Focus::Keywords => {
                let count = self.keyword_count();
                if count > 0 {
                    self.keyword_index = if self.keyword_index > 0 {
                        self.keyword_index - 1
                    } else {
                        count - 1
                    };
                    self.custom_keyword = None;
                }
            }
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Templates if self.session.selected().is_some() => Focus::Keywords,
            _ => Focus::Templates,
        };
    }

    /// Makes the highlighted template the current one and shows its content.
    pub fn select_highlighted(&mut self) {
        let Some(&index) = self.filtered_templates.get(self.highlighted_index) else {
            return;
        };
        let Some(record) = self.session.select(index) else {
            return;
        };
        self.output = record.content.clone();
        self.output_scroll = 0;
        self.keyword_index = 0;
        self.custom_keyword = None;
        self.focus = Focus::Keywords;
        self.clear_status();
    }

    pub fn highlighted_keyword(&self) -> Option<&Keyword> {
        self.session.selected()?.keywords.get(self.keyword_index)
    }

    /// Keyword the replacement field edits.
    pub fn current_target(&self) -> Option<String> {
        self.custom_keyword
            .clone()
            .or_else(|| self.highlighted_keyword().map(|k| k.text.clone()))
    }

    /// Label for the replacement field: `keyword(description)`.
    pub fn current_target_label(&self) -> Option<String> {
        match &self.custom_keyword {
            Some(keyword) => Some(format!("{keyword}(custom keyword)")),
            None => self
                .highlighted_keyword()
                .map(|k| format!("{}({})", k.text, k.description)),
        }
    }

    pub fn begin_replacement(&mut self) {
        let Some(target) = self.current_target() else {
            self.fail("Select a template and a keyword first.");
            return;
        };
        self.input = self
            .session
            .replacements
            .get(&target)
            .unwrap_or_default()
            .to_string();
        self.input_mode = InputMode::Replacement;
    }

    /// Stores the replacement field as typed so far; an empty field drops the
    /// keyword from the mapping.
    pub fn update_replacement(&mut self) {
        if let Some(target) = self.current_target() {
            self.session.set_replacement(target, self.input.clone());
        }
    }

    pub fn begin_custom_keyword(&mut self) {
        if self.session.selected().is_none() && self.output.is_empty() {
            self.fail("Select a template first.");
            return;
        }
        self.input.clear();
        self.input_mode = InputMode::CustomKeyword;
    }

    /// Either recognizes a command or switches the replacement target to the
    /// typed keyword.
    pub fn submit_custom_keyword(&mut self) -> Option<Command> {
        let keyword = std::mem::take(&mut self.input);
        self.input_mode = InputMode::Normal;
        if keyword.is_empty() {
            return None;
        }
        if let Some(command) = commands::recognize(&self.output, &keyword, &self.session.configs) {
            self.output.clear();
            return Some(command);
        }
        self.custom_keyword = Some(keyword);
        self.begin_replacement();
        None
    }

    pub fn render(&mut self) {
        match self.session.render() {
            Ok(text) => {
                self.output = text;
                self.output_scroll = 0;
                self.notify("Keywords replaced.");
            }
            Err(SubstituteError::NothingToReplace) => {
                self.notify(SubstituteError::NothingToReplace.to_string());
            }
            Err(err) => self.fail(err.to_string()),
        }
    }

    pub fn begin_output_edit(&mut self) {
        self.clear_status();
        self.input_mode = InputMode::OutputEdit;
    }

    pub fn type_into_output(&mut self, c: char) {
        self.output.push(c);
    }

    pub fn output_backspace(&mut self) {
        self.output.pop();
    }

    /// Draft of a new template holding the output and the selected
    /// template's keywords.
    pub fn draft_from_output(&self, name: &str) -> Result<TemplateDraft, EditorError> {
        let mut draft = TemplateDraft::new();
        draft.set_name(name.trim());
        draft.set_content(self.output.clone());
        if let Some(template) = self.session.selected() {
            for keyword in &template.keywords {
                draft.add_keyword(&keyword.text, &keyword.description)?;
            }
        }
        Ok(draft)
    }

    /// Opens the editor on the output, or on an empty draft when there is
    /// no output.
    pub fn open_editor(&mut self) {
        let draft = if self.output.is_empty() {
            Ok(TemplateDraft::new())
        } else {
            self.draft_from_output("")
        };
        match draft {
            Ok(draft) => {
                self.editor = Some(Editor::new(draft));
                self.input_mode = InputMode::Normal;
                self.clear_status();
            }
            Err(err) => self.fail(err.to_string()),
        }
    }

    pub fn close_editor(&mut self) {
        self.editor = None;
        self.input.clear();
        self.input_mode = InputMode::Normal;
    }

    pub fn has_unsaved_draft(&self) -> bool {
        self.editor.as_ref().is_some_and(|e| !e.draft.is_saved())
    }

    /// Starts typing into one of the draft fields.
    pub fn begin_draft_field(&mut self, mode: InputMode) {
        let Some(editor) = &self.editor else {
            return;
        };
        self.input = match mode {
            InputMode::DraftName => editor.draft.name().to_string(),
            InputMode::DraftContent => editor.draft.content().to_string(),
            _ => String::new(),
        };
        self.input_mode = mode;
    }

    /// Name and content follow the field as it is typed.
    pub fn update_draft_field(&mut self) {
        let Some(editor) = &mut self.editor else {
            return;
        };
        match self.input_mode {
            InputMode::DraftName => editor.draft.set_name(self.input.clone()),
            InputMode::DraftContent => editor.draft.set_content(self.input.clone()),
            _ => {}
        }
    }

    /// Finishes the keyword and description fields. A keyword moves on to
    /// its description; a description adds the pair.
    pub fn submit_draft_keyword(&mut self) {
        let value = std::mem::take(&mut self.input);
        let Some(editor) = &mut self.editor else {
            self.input_mode = InputMode::Normal;
            return;
        };
        match self.input_mode {
            InputMode::DraftKeyword => {
                editor.pending_keyword = Some(value);
                self.input_mode = InputMode::DraftDescription;
            }
            InputMode::DraftDescription => {
                let text = editor.pending_keyword.take().unwrap_or_default();
                let result = editor.draft.add_keyword(&text, &value);
                self.input_mode = InputMode::Normal;
                match result {
                    Ok(()) => self.notify(format!("Keyword {text} added.")),
                    Err(err) => self.fail(err.to_string()),
                }
            }
            _ => self.input_mode = InputMode::Normal,
        }
    }

    pub fn remove_draft_keyword(&mut self) {
        let Some(editor) = &mut self.editor else {
            return;
        };
        match editor.draft.remove_keyword(editor.keyword_index) {
            Ok(removed) => {
                let count = editor.draft.keywords().len();
                editor.keyword_index = editor.keyword_index.min(count.saturating_sub(1));
                self.notify(format!("Keyword {} removed.", removed.text));
            }
            Err(err) => self.fail(err.to_string()),
        }
    }

    pub fn clear_draft(&mut self) {
        if let Some(editor) = &mut self.editor {
            editor.draft.clear();
            editor.keyword_index = 0;
            editor.pending_keyword = None;
            self.notify("Editor cleared.");
        }
    }

    /// Replaces the draft with the template stored at `path`.
    pub fn open_draft_file(&mut self, path: &Path) {
        match TemplateDraft::open(path) {
            Ok(draft) => {
                let name = draft.name().to_string();
                self.editor = Some(Editor::new(draft));
                self.notify(format!("Opened template {name}."));
            }
            Err(err) => self.fail(err.to_string()),
        }
    }

    pub fn next_draft_keyword(&mut self) {
        if let Some(editor) = &mut self.editor {
            let count = editor.draft.keywords().len();
            if count > 0 {
                editor.keyword_index = (editor.keyword_index + 1) % count;
            }
        }
    }

    pub fn previous_draft_keyword(&mut self) {
        if let Some(editor) = &mut self.editor {
            let count = editor.draft.keywords().len();
            if count > 0 {
                editor.keyword_index = editor.keyword_index.checked_sub(1).unwrap_or(count - 1);
            }
        }
    }

    pub fn write_output(&mut self, path: &Path) {
        if self.output.is_empty() {
            self.fail("Nothing to write, the output is empty.");
            return;
        }
        match fs::write(path, &self.output) {
            Ok(()) => {
                info!("output written to {}", path.display());
                self.notify(format!("Output written to {}", path.display()));
            }
            Err(err) => self.fail(format!("Failed to write {}: {err}", path.display())),
        }
    }

    pub fn scroll_output(&mut self, delta: i32) {
        let lines = self.output.lines().count() as i32;
        let target = (self.output_scroll as i32 + delta).clamp(0, lines.saturating_sub(1).max(0));
        self.output_scroll = target as u16;
    }

    /// Template names in filtered order, paired with their store index.
    pub fn visible_templates(&self) -> Vec<(usize, &str)> {
        self.filtered_templates
            .iter()
            .filter_map(|&i| self.session.store.get(i).map(|r| (i, r.name.as_str())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyplate::config::{ConfigKey, ConfigValue};
    use keyplate::models::TemplateRecord;

    fn app() -> App {
        let mut session = Session::new("templates");
        for (i, name) in ["Weekly report", "Meeting notes", "Release notes"].iter().enumerate() {
            let record = TemplateRecord::new(
                *name,
                "Hi WHO, see you DAY.",
                vec![
                    Keyword {
                        text: "WHO".into(),
                        description: "person".into(),
                    },
                    Keyword {
                        text: "DAY".into(),
                        description: "weekday".into(),
                    },
                ],
            );
            session.store.insert(record, format!("h{i}"), None).unwrap();
        }
        let mut app = App::new(session, LogBuffer::new(16), false);
        app.apply_filter();
        app
    }

    #[test]
    fn search_narrows_the_list() {
        let mut app = app();
        app.search_query = "notes".into();
        app.apply_filter();
        let names: Vec<_> = app.visible_templates().into_iter().map(|(_, n)| n).collect();
        assert_eq!(names.len(), 2);
        assert!(!names.contains(&"Weekly report"));
    }

    #[test]
    fn typing_a_replacement_updates_the_mapping_live() {
        let mut app = app();
        app.select_highlighted();
        app.begin_replacement();
        app.input = "Ada".into();
        app.update_replacement();
        assert_eq!(app.session.replacements.get("WHO"), Some("Ada"));

        app.input.clear();
        app.update_replacement();
        assert!(app.session.replacements.is_empty());
    }

    #[test]
    fn render_replaces_into_output() {
        let mut app = app();
        app.select_highlighted();
        app.session.set_replacement("WHO", "Ada");
        app.session.set_replacement("DAY", "Monday");
        app.render();
        assert_eq!(app.output, "Hi Ada, see you Monday.");
    }

    #[test]
    fn custom_keyword_becomes_the_target() {
        let mut app = app();
        app.select_highlighted();
        app.begin_custom_keyword();
        app.input = "see".into();
        assert_eq!(app.submit_custom_keyword(), None);
        assert_eq!(app.current_target().as_deref(), Some("see"));
        assert_eq!(app.input_mode, InputMode::Replacement);
    }

    #[test]
    fn editor_opens_on_the_rendered_output() {
        let mut app = app();
        app.select_highlighted();
        app.session.set_replacement("WHO", "Ada");
        app.render();
        app.open_editor();
        let editor = app.editor.as_ref().unwrap();
        assert_eq!(editor.draft.content(), "Hi Ada, see you DAY.");
        assert_eq!(editor.draft.keywords().len(), 2);
        assert!(app.has_unsaved_draft());
    }

    #[test]
    fn editor_fields_drive_the_draft() {
        let mut app = app();
        app.open_editor();
        assert!(!app.has_unsaved_draft());

        app.begin_draft_field(InputMode::DraftName);
        app.input = "Invite".into();
        app.update_draft_field();
        app.input_mode = InputMode::Normal;

        app.begin_draft_field(InputMode::DraftKeyword);
        app.input = "WHEN".into();
        app.submit_draft_keyword();
        assert_eq!(app.input_mode, InputMode::DraftDescription);
        app.input = "time".into();
        app.submit_draft_keyword();

        let record = app.editor.as_ref().unwrap().draft.to_record();
        assert_eq!(record.name, "Invite");
        assert_eq!(record.keywords().collect::<Vec<_>>(), vec!["WHEN"]);

        app.remove_draft_keyword();
        assert!(app.editor.as_ref().unwrap().draft.keywords().is_empty());
        app.remove_draft_keyword();
        assert!(app.error.is_some());

        app.clear_draft();
        assert!(!app.has_unsaved_draft());
        assert!(app.editor.as_ref().unwrap().draft.name().is_empty());
    }

    #[test]
    fn empty_description_is_reported() {
        let mut app = app();
        app.open_editor();
        app.begin_draft_field(InputMode::DraftKeyword);
        app.input = "X".into();
        app.submit_draft_keyword();
        app.submit_draft_keyword();
        assert!(app.error.is_some());
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn editor_opens_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.json");
        fs::write(&path, r#"{"name": "Memo", "content": "To TO", "rolename": ["TO"], "roledes": ["recipient"]}"#).unwrap();

        let mut app = app();
        app.open_editor();
        app.open_draft_file(&path);
        let editor = app.editor.as_ref().unwrap();
        assert_eq!(editor.draft.name(), "Memo");
        assert!(editor.draft.is_saved());

        app.open_draft_file(&dir.path().join("missing.json"));
        assert!(app.error.is_some());
    }

    #[test]
    fn typed_command_word_reaches_the_command() {
        let mut app = app();
        app.begin_output_edit();
        for c in "AboutInfo".chars() {
            app.type_into_output(c);
        }
        app.type_into_output('!');
        app.output_backspace();
        app.input_mode = InputMode::Normal;

        app.begin_custom_keyword();
        app.input = "Show".into();
        assert_eq!(app.submit_custom_keyword(), Some(Command::About));
    }

    #[test]
    fn command_word_in_output_runs_a_command() {
        let mut app = app();
        app.session
            .configs
            .set(ConfigKey::AllowCommand, ConfigValue::Flag(true));
        app.output = "EnableDebugMode".into();
        app.input_mode = InputMode::CustomKeyword;
        app.input = "True".into();
        assert_eq!(app.submit_custom_keyword(), Some(Command::EnableDebug));
        assert!(app.output.is_empty());
    }
}
