//! Reads template files from disk into the session.
//!
//! Every file goes through the same pipeline: extension check, decode,
//! key normalization, config/template classification, required-key
//! validation, duplicate detection by content hash, then ingestion. A file
//! that fails any step is skipped and the walk continues.

use std::fs;
use std::path::Path;

use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::MergeOutcome;
use crate::error::{ConfigError, LoadError};
use crate::hash::blob_hash;
use crate::models::{Document, TEMPLATE_EXTENSION, parse_document};
use crate::prompt::Confirm;
use crate::session::Session;

/// What happened to one candidate file.
#[derive(Debug)]
pub enum FileOutcome {
    /// Added to the store under this display name.
    Loaded(String),
    /// Routed to the config merger.
    Config(Result<MergeOutcome, ConfigError>),
    /// Same content as the named, already loaded template.
    Duplicate(String),
    Rejected(LoadError),
}

/// Per-load counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub configs: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

impl LoadSummary {
    fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Loaded(_) => self.loaded += 1,
            FileOutcome::Config(_) => self.configs += 1,
            FileOutcome::Duplicate(_) => self.duplicates += 1,
            FileOutcome::Rejected(_) => self.rejected += 1,
        }
    }
}

/// Clears the store and reloads every file under the session's templates
/// directory, creating the directory if it does not exist yet.
pub fn load_dir(session: &mut Session, prompt: &mut dyn Confirm) -> Result<LoadSummary, LoadError> {
    session.set_loading(true);
    let result = walk(session, prompt);
    session.set_loading(false);
    result
}

fn walk(session: &mut Session, prompt: &mut dyn Confirm) -> Result<LoadSummary, LoadError> {
    session.deselect();
    session.store.clear();

    let dir = session.templates_dir().to_path_buf();
    info!("loading templates from {}", dir.display());
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| LoadError::io(&dir, e))?;
        info!("created templates directory {}", dir.display());
    }

    let mut summary = LoadSummary::default();
    for entry in WalkDir::new(&dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let label = entry
            .path()
            .strip_prefix(&dir)
            .unwrap_or(entry.path())
            .display()
            .to_string();
        let outcome = load_file(session, entry.path(), &label, prompt);
        summary.record(&outcome);
    }

    info!("templates loaded, {} template files in total", session.store.len());
    Ok(summary)
}

/// Adds a single file picked by the user without clearing the store.
pub fn import_file(session: &mut Session, path: &Path, prompt: &mut dyn Confirm) -> FileOutcome {
    info!("importing template file {}", path.display());
    load_file(session, path, &path.display().to_string(), prompt)
}

fn load_file(session: &mut Session, path: &Path, label: &str, prompt: &mut dyn Confirm) -> FileOutcome {
    if let Err(err) = check_extension(label) {
        return FileOutcome::Rejected(err);
    }
    match fs::read(path) {
        Ok(bytes) => ingest_checked(session, &bytes, label, path, prompt),
        Err(e) => {
            let err = LoadError::io(path, e);
            error!("{err}, skipping");
            FileOutcome::Rejected(err)
        }
    }
}

fn check_extension(label: &str) -> Result<(), LoadError> {
    let file_name = Path::new(label)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if file_name.contains(TEMPLATE_EXTENSION) {
        Ok(())
    } else {
        let err = LoadError::UnsupportedType(label.to_string());
        error!("{err}, skipping");
        Err(err)
    }
}

fn ingest_checked(
    session: &mut Session,
    bytes: &[u8],
    label: &str,
    source: &Path,
    prompt: &mut dyn Confirm,
) -> FileOutcome {
    let document = match parse_document(bytes, label) {
        Ok(document) => document,
        Err(err) => {
            error!("{err}, skipping");
            return FileOutcome::Rejected(err);
        }
    };

    match document {
        Document::Config(doc) => {
            info!("found config file: {label}, applying");
            let version = session.app_version().to_string();
            FileOutcome::Config(session.configs.merge(&doc, &version, prompt))
        }
        Document::Template(doc) => {
            let hash = blob_hash(bytes);
            if let Some(existing) = session.store.name_for_hash(&hash) {
                warn!("identical template already loaded: {existing}, skipping {label}");
                return FileOutcome::Duplicate(existing.to_string());
            }
            let record = doc.into_record();
            let name = record.name.clone();
            match session.store.insert(record, hash, Some(source.to_path_buf())) {
                Ok(()) => {
                    info!("loaded template file: {name}");
                    FileOutcome::Loaded(name)
                }
                Err(existing) => FileOutcome::Duplicate(existing),
            }
        }
    }
}
