use std::cmp::Ordering;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::{ConfigKey, ConfigValue, Configs};
use crate::models::Release;
use crate::session::Session;

#[derive(Debug, Clone)]
pub enum UpdateStatus {
    UpToDate,
    Available(Release),
    /// Newer, but the user asked not to be reminded of this version.
    Ignored(Release),
    /// The running version is newer than the latest release.
    AheadOfRelease,
}

/// Compares dotted version strings numerically, ignoring a leading `v`.
/// Missing components count as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = components(a);
    let b = components(b);
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| a.get(i).copied().unwrap_or(0).cmp(&b.get(i).copied().unwrap_or(0)))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn components(version: &str) -> Vec<u64> {
    version
        .trim()
        .trim_start_matches(['v', 'V'])
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Decides whether `release` should be offered to the user.
pub fn check(current: &str, release: Release, configs: &Configs) -> UpdateStatus {
    info!("{}", describe(current, &release));
    match compare_versions(&release.tag_name, current) {
        Ordering::Greater => {
            if configs.ignored_versions().contains(&release.tag_name) {
                warn!("new version {} found but ignored by config, skipping", release.tag_name);
                UpdateStatus::Ignored(release)
            } else {
                warn!("new version {} available", release.tag_name);
                UpdateStatus::Available(release)
            }
        }
        Ordering::Less => {
            warn!("current version {current} is newer than the latest release {}", release.tag_name);
            UpdateStatus::AheadOfRelease
        }
        Ordering::Equal => {
            info!("already on the latest version {current}");
            UpdateStatus::UpToDate
        }
    }
}

/// Multi-line summary of a release for logs and dialogs.
pub fn describe(current: &str, release: &Release) -> String {
    let mut lines = vec![
        format!("current version: {current}"),
        format!("latest version: {}", release.tag_name),
    ];
    if let Some(published) = &release.published_at {
        lines.push(format!("published: {published}"));
    }
    if let Some(asset) = release.assets.first() {
        lines.push(format!(
            "file size: {} bytes ({:.2} MB)",
            asset.size,
            asset.size as f64 / 1_000_000.0
        ));
    }
    if let Some(body) = &release.body {
        lines.push(format!("release notes: {body}"));
    }
    lines.join("\n")
}

/// Stops reminding about `tag` and persists the ignore list.
pub fn ignore_version(session: &mut Session, tag: &str) -> std::io::Result<Option<PathBuf>> {
    let mut versions = session.configs.ignored_versions().to_vec();
    if !versions.iter().any(|v| v == tag) {
        versions.insert(0, tag.to_string());
    }
    info!("ignored versions: {}", versions.join(", "));
    session
        .configs
        .set(ConfigKey::IgnoredVersion, ConfigValue::Versions(versions));
    let version = session.app_version().to_string();
    session
        .configs
        .persist(ConfigKey::IgnoredVersion, session.templates_dir(), &version)
}
