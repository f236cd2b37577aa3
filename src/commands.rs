//! Hidden command keywords and discovery bookkeeping.
//!
//! A command fires when the output pane holds a command word and the user
//! types the matching argument as a custom keyword.

use chrono::Local;
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::config::{ConfigKey, ConfigValue, Configs};
use crate::session::Session;

/// Discovery recorded when the about text is opened.
pub const ABOUT_DISCOVERY: &str = "Who am I?";

/// Version written into the persisted discoveries document.
const DISCOVERY_DOCUMENT_VERSION: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    EnableDebug,
    DisableDebug,
    ShowUpdate,
    SyncTemplates,
    About,
}

impl Command {
    pub fn parse(output: &str, keyword: &str) -> Option<Self> {
        match (output, keyword) {
            ("EnableDebugMode", "True") => Some(Command::EnableDebug),
            ("EnableDebugMode", "False") => Some(Command::DisableDebug),
            ("FormUpdate", "Show") => Some(Command::ShowUpdate),
            ("SyncTemplates", "Check") => Some(Command::SyncTemplates),
            ("AboutInfo", "Show") => Some(Command::About),
            _ => None,
        }
    }

    /// Whether `allow_command` must be set for this command to run.
    pub fn requires_permission(self) -> bool {
        !matches!(self, Command::About)
    }
}

/// The command to run for the current output and custom keyword, if allowed.
pub fn recognize(output: &str, keyword: &str, configs: &Configs) -> Option<Command> {
    let command = Command::parse(output, keyword)?;
    if command.requires_permission() && !configs.allow_command() {
        debug!("command {command:?} ignored, allow_command is not set");
        return None;
    }
    info!("running command {command:?}");
    Some(command)
}

pub fn about_text(version: &str) -> String {
    format!("keyplate {version}\nFill keyword placeholders in text templates.")
}

/// Records `title` as discovered now and persists the list.
///
/// Returns `false` without touching anything when it was already found.
pub fn discover(session: &mut Session, title: &str) -> std::io::Result<bool> {
    let mut eggs = session
        .configs
        .discovered_eggs()
        .cloned()
        .unwrap_or_else(IndexMap::new);
    if eggs.contains_key(title) {
        return Ok(false);
    }
    eggs.insert(
        title.to_string(),
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    let total = eggs.len();
    session
        .configs
        .set(ConfigKey::DiscoveredEggs, ConfigValue::Eggs(eggs));
    info!("discovered [{title}], {total} discovered in total");
    session.configs.persist(
        ConfigKey::DiscoveredEggs,
        session.templates_dir(),
        DISCOVERY_DOCUMENT_VERSION,
    )?;
    Ok(true)
}
