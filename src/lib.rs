//! Fill keyword placeholders in text templates.
//!
//! Templates are JSON documents loaded from a directory into a
//! [`session::Session`]. Config documents found among them adjust
//! process-wide settings. Templates can be synchronized with a GitHub
//! repository, deduplicated by Git blob hash.

pub mod api;
pub mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod hash;
pub mod loader;
pub mod logging;
pub mod models;
pub mod prompt;
pub mod session;
pub mod store;
pub mod substitute;
pub mod sync;
pub mod update;
