use indexmap::IndexMap;
use tracing::{error, info, warn};

use crate::error::SubstituteError;
use crate::models::TemplateRecord;

/// Keyword replacements for the selected template, in the order the user
/// first entered them.
#[derive(Debug, Default, Clone)]
pub struct Replacements {
    entries: IndexMap<String, String>,
}

impl Replacements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the replacement for `keyword`. An empty `value` removes it.
    pub fn set(&mut self, keyword: impl Into<String>, value: impl Into<String>) {
        let keyword = keyword.into();
        let value = value.into();
        if value.is_empty() {
            self.entries.shift_remove(&keyword);
        } else {
            self.entries.insert(keyword, value);
        }
    }

    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.entries.get(keyword).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Replaces every keyword of `replacements` in the template content.
///
/// Each pair is a literal, global replace applied to the output of the
/// previous one. Replacement text is never scanned again for the same key.
pub fn render(
    template: Option<&TemplateRecord>,
    replacements: &Replacements,
) -> Result<String, SubstituteError> {
    let Some(template) = template else {
        error!("{}", SubstituteError::NoTemplateSelected);
        return Err(SubstituteError::NoTemplateSelected);
    };
    if replacements.is_empty() {
        warn!("{}", SubstituteError::NothingToReplace);
        return Err(SubstituteError::NothingToReplace);
    }

    let mut text = template.content.clone();
    for (keyword, value) in replacements.iter() {
        text = text.replace(keyword, value);
        info!("replaced keyword \"{keyword}\" with \"{value}\"");
    }
    info!("keyword replacement finished");
    Ok(text)
}
