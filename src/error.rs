//! Error types for the template pipeline.
//!
//! Every family is recoverable: the caller logs the error and moves on to the
//! next file, key or action.

use std::path::PathBuf;

/// Reasons a candidate file is not ingested.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unsupported file type (only .json is supported): {0}")]
    UnsupportedType(String),

    #[error("corrupt template file: {0}, content is empty or not valid JSON")]
    InvalidJson(String),

    #[error("corrupt template file: {0}, content has invalid text encoding")]
    InvalidEncoding(String),

    #[error("corrupt template file: {path}, missing keys: {}", .keys.join(", "))]
    MissingKeys { path: String, keys: Vec<&'static str> },

    #[error("corrupt template file: {path}, {message}")]
    InvalidField { path: String, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A config document that is rejected before any key is looked at.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("config document is not enabled or malformed")]
    NotEnabled,

    #[error("config document version does not match (current: {current}, document: {found})")]
    VersionMismatch { current: String, found: String },
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubstituteError {
    #[error("no template selected, skipping replacement")]
    NoTemplateSelected,

    #[error("nothing to replace, skipping replacement")]
    NothingToReplace,
}

/// Failures talking to the remote template repository.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network connection failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("remote API returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("cannot save a template with empty content")]
    EmptyContent,

    #[error("keyword and description must both be non-empty")]
    EmptyKeyword,

    #[error("no keyword at index {0}")]
    NoSuchKeyword(usize),

    #[error("{0} is a config document, not a template")]
    NotATemplate(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
