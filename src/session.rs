use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{APP_VERSION, Configs};
use crate::error::SubstituteError;
use crate::models::TemplateRecord;
use crate::store::TemplateStore;
use crate::substitute::{self, Replacements};

/// Everything one running instance owns: loaded templates, settings and the
/// current selection.
#[derive(Debug)]
pub struct Session {
    pub store: TemplateStore,
    pub configs: Configs,
    pub replacements: Replacements,
    templates_dir: PathBuf,
    app_version: String,
    selected: Option<usize>,
    loading: bool,
}

impl Session {
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: TemplateStore::new(),
            configs: Configs::new(),
            replacements: Replacements::new(),
            templates_dir: templates_dir.into(),
            app_version: APP_VERSION.to_string(),
            selected: None,
            loading: false,
        }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Selects the template at `index` and starts a fresh replacement set.
    ///
    /// Ignored while a reload is running.
    pub fn select(&mut self, index: usize) -> Option<&TemplateRecord> {
        if self.loading {
            debug!("selection ignored while templates are loading");
            return None;
        }
        let record = self.store.get(index)?;
        info!("selected template: {}", record.name);
        self.selected = Some(index);
        self.replacements.clear();
        self.store.get(index)
    }

    pub fn deselect(&mut self) {
        self.selected = None;
        self.replacements.clear();
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected(&self) -> Option<&TemplateRecord> {
        self.selected.and_then(|i| self.store.get(i))
    }

    pub fn set_replacement(&mut self, keyword: impl Into<String>, value: impl Into<String>) {
        self.replacements.set(keyword, value);
    }

    /// Renders the selected template with the current replacements.
    pub fn render(&self) -> Result<String, SubstituteError> {
        substitute::render(self.selected(), &self.replacements)
    }
}
