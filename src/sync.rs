//! Template synchronization against the remote template repository.

use std::fmt;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::loader;
use crate::models::{RemoteEntry, TEMPLATE_EXTENSION};
use crate::prompt::{Confirm, Decision, Resolution};
use crate::session::Session;
use crate::store::TemplateStore;

/// Appended to the file name when a changed remote template is kept next to
/// the local one.
pub const RENAME_SUFFIX: &str = "_cloud-sync";

/// Where remote templates come from.
pub trait RemoteSource {
    fn list_templates(&self) -> impl Future<Output = Result<Vec<RemoteEntry>, ApiError>>;

    fn fetch_file(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ApiError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No local template has this name.
    New,
    /// A local template has this name but different content.
    Changed,
    Unchanged,
}

/// Compares one remote entry against the local hash index.
pub fn classify(store: &TemplateStore, entry: &RemoteEntry) -> Classification {
    if !store.contains_name(&entry.template_name()) {
        Classification::New
    } else if !store.contains_hash(&entry.sha) {
        Classification::Changed
    } else {
        Classification::Unchanged
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub found: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub new: usize,
    pub downloaded: usize,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "found {} remote templates, {} up to date, {} changed, {} not present locally, {} downloaded",
            self.found, self.unchanged, self.changed, self.new, self.downloaded
        )
    }
}

/// Fetches the remote listing, asks what to download, downloads it and
/// reloads the store if anything changed on disk.
///
/// Only the listing request can fail the whole operation; a failed download
/// is logged and skipped.
pub async fn synchronize<R: RemoteSource>(
    session: &mut Session,
    remote: &R,
    prompt: &mut dyn Confirm,
) -> Result<SyncSummary, ApiError> {
    info!("starting template sync");
    let dir = session.templates_dir().to_path_buf();
    fs::create_dir_all(&dir).map_err(|source| ApiError::Io {
        path: dir.clone(),
        source,
    })?;

    let listing = match remote.list_templates().await {
        Ok(listing) => listing,
        Err(err) => {
            error!("template sync failed: {err}");
            return Err(err);
        }
    };
    info!("fetched remote template list");

    let mut summary = SyncSummary::default();
    let mut pending = Vec::new();

    for entry in &listing {
        summary.found += 1;
        let name = entry.template_name();

        match classify(&session.store, entry) {
            Classification::New => {
                summary.new += 1;
                info!("found new template: {name}, {} bytes", entry.size);
                pending.push(entry);
            }
            Classification::Changed => {
                summary.changed += 1;
                info!("found changed template: {name}, {} bytes, asking", entry.size);
                let local = session
                    .store
                    .source_for_name(&name)
                    .filter(|source| source.starts_with(&dir))
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| dir.join(format!("{name}{TEMPLATE_EXTENSION}")));
                let detail = format!("local template: {}", local.display());
                let resolution = prompt.ask_resolution(
                    "Download template",
                    "A remote template has the same name as a local one but different content. Overwrite it?",
                    Some(&detail),
                );
                let target = match resolution {
                    Resolution::Overwrite => {
                        info!("overwriting local template {name}");
                        Some(local)
                    }
                    Resolution::Rename => {
                        info!("downloading {name} under a new name");
                        Some(renamed_target(&dir, &name))
                    }
                    Resolution::Skip => {
                        warn!("not downloading template {name}, skipped");
                        None
                    }
                };
                if let Some(target) = target {
                    if download(remote, entry, &target).await {
                        summary.downloaded += 1;
                    }
                }
            }
            Classification::Unchanged => {
                summary.unchanged += 1;
                let local_name = session.store.name_for_hash(&entry.sha).unwrap_or(&name);
                warn!("template already up to date: {local_name}, skipped");
            }
        }
    }

    if !pending.is_empty() {
        let message = format!("Download the following {} new templates?", pending.len());
        let detail = pending
            .iter()
            .map(|e| format!("{} ({} bytes, {:.2} MB)", e.name, e.size, e.size as f64 / 1_000_000.0))
            .collect::<Vec<_>>()
            .join("\n");
        if prompt.ask_yes_no("Download templates", &message, Some(&detail)) == Decision::Yes {
            for entry in pending {
                let Some(target) = free_target(session, &dir, entry, prompt) else {
                    continue;
                };
                if download(remote, entry, &target).await {
                    summary.downloaded += 1;
                }
            }
        } else {
            info!("new templates not downloaded");
        }
    }

    if summary.downloaded > 0 {
        if let Err(err) = loader::load_dir(session, prompt) {
            error!("reloading templates after sync failed: {err}");
        }
    }

    info!("template sync finished: {summary}");
    Ok(summary)
}

/// Where a new remote template goes. A local file already at that path is
/// only replaced when the user agrees; `None` means skip the entry.
fn free_target(
    session: &Session,
    dir: &Path,
    entry: &RemoteEntry,
    prompt: &mut dyn Confirm,
) -> Option<PathBuf> {
    let name = entry.template_name();
    let target = dir.join(format!("{name}{TEMPLATE_EXTENSION}"));
    if !target.exists() {
        return Some(target);
    }
    let detail = match session.store.name_for_source(&target) {
        Some(local) => format!("{} holds the local template {local}", target.display()),
        None => format!("existing file: {}", target.display()),
    };
    match prompt.ask_resolution(
        "File already exists",
        "A new remote template would replace a local file. Overwrite it?",
        Some(&detail),
    ) {
        Resolution::Overwrite => {
            info!("overwriting local file {}", target.display());
            Some(target)
        }
        Resolution::Rename => {
            info!("downloading {name} under a new name");
            Some(renamed_target(dir, &name))
        }
        Resolution::Skip => {
            warn!("not downloading template {name}, {} left untouched", target.display());
            None
        }
    }
}

/// `<name>_cloud-sync.json`, or the first `<name>_cloud-sync-N.json` that does
/// not exist yet.
pub fn renamed_target(dir: &Path, name: &str) -> PathBuf {
    let base = format!("{name}{RENAME_SUFFIX}");
    let mut candidate = dir.join(format!("{base}{TEMPLATE_EXTENSION}"));
    let mut n = 2;
    while candidate.exists() {
        candidate = dir.join(format!("{base}-{n}{TEMPLATE_EXTENSION}"));
        n += 1;
    }
    candidate
}

async fn download<R: RemoteSource>(remote: &R, entry: &RemoteEntry, target: &Path) -> bool {
    let Some(url) = entry.download_url.as_deref() else {
        warn!("remote entry {} has no download url, skipped", entry.name);
        return false;
    };
    info!("downloading template from {url}");
    let bytes = match remote.fetch_file(url).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("template download failed: {err}");
            return false;
        }
    };
    match fs::write(target, bytes) {
        Ok(()) => {
            info!("template saved to {}", target.display());
            true
        }
        Err(err) => {
            error!("failed to save {}: {err}", target.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::hash::blob_hash;
    use crate::models::TemplateRecord;
    use crate::prompt::testing::ScriptedPrompt;

    struct FakeRemote {
        entries: Option<Vec<RemoteEntry>>,
        files: HashMap<String, Vec<u8>>,
    }

    impl FakeRemote {
        fn new() -> Self {
            Self {
                entries: Some(Vec::new()),
                files: HashMap::new(),
            }
        }

        fn offline() -> Self {
            Self {
                entries: None,
                files: HashMap::new(),
            }
        }

        fn with_file(mut self, file_name: &str, body: &str) -> Self {
            let url = format!("https://raw.example/{file_name}");
            self.entries.get_or_insert_with(Vec::new).push(RemoteEntry::file(
                file_name,
                blob_hash(body.as_bytes()),
                body.len() as u64,
                url.clone(),
            ));
            self.files.insert(url, body.as_bytes().to_vec());
            self
        }
    }

    impl RemoteSource for FakeRemote {
        async fn list_templates(&self) -> Result<Vec<RemoteEntry>, ApiError> {
            self.entries.clone().ok_or_else(|| ApiError::Status {
                status: 503,
                url: "listing".into(),
            })
        }

        async fn fetch_file(&self, url: &str) -> Result<Vec<u8>, ApiError> {
            self.files.get(url).cloned().ok_or_else(|| ApiError::Status {
                status: 404,
                url: url.to_string(),
            })
        }
    }

    fn template_json(name: &str, content: &str) -> String {
        format!(r#"{{"name": "{name}", "content": "{content}", "rolename": ["X"], "roledes": ["x"]}}"#)
    }

    fn session_in(dir: &Path, files: &[(&str, &str)]) -> Session {
        for (name, body) in files {
            fs::write(dir.join(name), body).unwrap();
        }
        let mut session = Session::new(dir);
        loader::load_dir(&mut session, &mut ScriptedPrompt::new()).unwrap();
        session
    }

    #[test]
    fn classification_follows_name_then_hash() {
        let mut store = TemplateStore::new();
        store
            .insert(TemplateRecord::new("A", "a", Vec::new()), "hashA".into(), None)
            .unwrap();

        let a = RemoteEntry::file("A.json", "hashA", 1, "u");
        let b = RemoteEntry::file("B.json", "hashB", 1, "u");
        let a2 = RemoteEntry::file("A.json", "hashA2", 1, "u");
        assert_eq!(classify(&store, &a), Classification::Unchanged);
        assert_eq!(classify(&store, &b), Classification::New);
        assert_eq!(classify(&store, &a2), Classification::Changed);
    }

    #[test]
    fn rename_target_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let first = renamed_target(dir.path(), "A");
        assert_eq!(first.file_name().unwrap(), "A_cloud-sync.json");
        fs::write(&first, "{}").unwrap();
        let second = renamed_target(dir.path(), "A");
        assert_eq!(second.file_name().unwrap(), "A_cloud-sync-2.json");
    }

    #[tokio::test]
    async fn new_templates_are_downloaded_in_one_batch() {
        let dir = tempfile::tempdir().unwrap();
        let local = template_json("A", "local");
        let mut session = session_in(dir.path(), &[("A.json", &local)]);
        let remote = FakeRemote::new()
            .with_file("A.json", &local)
            .with_file("B.json", &template_json("B", "b"))
            .with_file("C.json", &template_json("C", "c"));

        let mut prompt = ScriptedPrompt::with_decisions([Decision::Yes]);
        let summary = synchronize(&mut session, &remote, &mut prompt).await.unwrap();

        assert_eq!(
            summary,
            SyncSummary {
                found: 3,
                unchanged: 1,
                changed: 0,
                new: 2,
                downloaded: 2
            }
        );
        assert_eq!(prompt.asked.len(), 1);
        assert_eq!(session.store.names(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn declined_batch_downloads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), &[]);
        let remote = FakeRemote::new().with_file("B.json", &template_json("B", "b"));

        let mut prompt = ScriptedPrompt::with_decisions([Decision::No]);
        let summary = synchronize(&mut session, &remote, &mut prompt).await.unwrap();
        assert_eq!(summary.new, 1);
        assert_eq!(summary.downloaded, 0);
        assert!(!dir.path().join("B.json").exists());
    }

    #[tokio::test]
    async fn overwritten_template_is_up_to_date_afterwards() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), &[("A.json", &template_json("A", "old"))]);
        let remote = FakeRemote::new().with_file("A.json", &template_json("A", "new"));

        let mut prompt = ScriptedPrompt::with_resolutions([Resolution::Overwrite]);
        let summary = synchronize(&mut session, &remote, &mut prompt).await.unwrap();
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(session.store.get(0).unwrap().content, "new");

        let again = synchronize(&mut session, &remote, &mut ScriptedPrompt::new()).await.unwrap();
        assert_eq!(again.unchanged, 1);
        assert_eq!(again.downloaded, 0);
    }

    #[tokio::test]
    async fn renamed_download_keeps_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), &[("A.json", &template_json("A", "old"))]);
        let remote = FakeRemote::new().with_file("A.json", &template_json("A", "new"));

        let mut prompt = ScriptedPrompt::with_resolutions([Resolution::Rename]);
        synchronize(&mut session, &remote, &mut prompt).await.unwrap();
        assert!(dir.path().join("A_cloud-sync.json").exists());
        assert_eq!(session.store.len(), 2);
    }

    #[tokio::test]
    async fn skipped_change_leaves_disk_alone() {
        let dir = tempfile::tempdir().unwrap();
        let old = template_json("A", "old");
        let mut session = session_in(dir.path(), &[("A.json", &old)]);
        let remote = FakeRemote::new().with_file("A.json", &template_json("A", "new"));

        let mut prompt = ScriptedPrompt::with_resolutions([Resolution::Skip]);
        let summary = synchronize(&mut session, &remote, &mut prompt).await.unwrap();
        assert_eq!(summary.downloaded, 0);
        assert_eq!(fs::read_to_string(dir.path().join("A.json")).unwrap(), old);
    }

    #[tokio::test]
    async fn new_template_never_silently_replaces_a_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let mine = template_json("My letter", "mine");
        let mut session = session_in(dir.path(), &[("B.json", &mine)]);
        let remote = FakeRemote::new().with_file("B.json", &template_json("B", "b"));

        let mut prompt = ScriptedPrompt::with_decisions([Decision::Yes]);
        prompt.resolutions.push_back(Resolution::Rename);
        let summary = synchronize(&mut session, &remote, &mut prompt).await.unwrap();

        assert_eq!(summary.new, 1);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(prompt.asked.len(), 2);
        assert_eq!(fs::read_to_string(dir.path().join("B.json")).unwrap(), mine);
        assert!(dir.path().join("B_cloud-sync.json").exists());
        assert_eq!(session.store.names(), vec!["My letter", "B"]);
    }

    #[tokio::test]
    async fn skipped_collision_keeps_the_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let mine = template_json("My letter", "mine");
        let mut session = session_in(dir.path(), &[("B.json", &mine)]);
        let remote = FakeRemote::new().with_file("B.json", &template_json("B", "b"));

        let mut prompt = ScriptedPrompt::with_decisions([Decision::Yes]);
        prompt.resolutions.push_back(Resolution::Skip);
        let summary = synchronize(&mut session, &remote, &mut prompt).await.unwrap();

        assert_eq!(summary.downloaded, 0);
        assert_eq!(fs::read_to_string(dir.path().join("B.json")).unwrap(), mine);
        assert_eq!(session.store.names(), vec!["My letter"]);
    }

    #[tokio::test]
    async fn overwrite_targets_the_file_the_template_came_from() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), &[("letters.json", &template_json("A", "old"))]);
        let new = template_json("A", "new");
        let remote = FakeRemote::new().with_file("A.json", &new);

        let mut prompt = ScriptedPrompt::with_resolutions([Resolution::Overwrite]);
        let summary = synchronize(&mut session, &remote, &mut prompt).await.unwrap();

        assert_eq!(summary.downloaded, 1);
        assert!(!dir.path().join("A.json").exists());
        assert_eq!(fs::read_to_string(dir.path().join("letters.json")).unwrap(), new);
        assert_eq!(session.store.len(), 1);
        assert_eq!(session.store.get(0).unwrap().content, "new");
    }

    #[tokio::test]
    async fn listing_failure_keeps_local_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), &[("A.json", &template_json("A", "a"))]);
        let result = synchronize(&mut session, &FakeRemote::offline(), &mut ScriptedPrompt::new()).await;
        assert!(result.is_err());
        assert_eq!(session.store.len(), 1);
    }

    #[tokio::test]
    async fn failed_download_is_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), &[]);
        let mut remote = FakeRemote::new().with_file("B.json", &template_json("B", "b"));
        remote.files.clear();

        let mut prompt = ScriptedPrompt::with_decisions([Decision::Yes]);
        let summary = synchronize(&mut session, &remote, &mut prompt).await.unwrap();
        assert_eq!(summary.new, 1);
        assert_eq!(summary.downloaded, 0);
        assert!(session.store.is_empty());
    }
}
