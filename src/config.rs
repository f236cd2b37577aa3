use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

use crate::error::ConfigError;
use crate::prompt::{Confirm, Decision};

/// Version string config documents are matched against.
pub const APP_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Document versions accepted regardless of the running version.
pub const WILDCARD_VERSIONS: [&str; 2] = ["*", "all"];

/// Settings a config document may carry, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    IgnoredVersion,
    AllowCommand,
    DiscoveredEggs,
    EnableDebug,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 4] = [
        ConfigKey::IgnoredVersion,
        ConfigKey::AllowCommand,
        ConfigKey::DiscoveredEggs,
        ConfigKey::EnableDebug,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::IgnoredVersion => "ignored_version",
            ConfigKey::AllowCommand => "allow_command",
            ConfigKey::DiscoveredEggs => "discovered_eggs",
            ConfigKey::EnableDebug => "enable_debug",
        }
    }

    /// File the setting is persisted to inside the templates directory.
    pub fn file_name(self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Versions(Vec<String>),
    Flag(bool),
    /// Discovery title mapped to when it was found.
    Eggs(IndexMap<String, String>),
}

impl ConfigValue {
    /// Converts `value` into the shape `key` expects, or `None` if it has the
    /// wrong type.
    pub fn from_json(key: ConfigKey, value: &Value) -> Option<Self> {
        match key {
            ConfigKey::IgnoredVersion => value
                .as_array()?
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(ConfigValue::Versions),
            ConfigKey::AllowCommand | ConfigKey::EnableDebug => value.as_bool().map(ConfigValue::Flag),
            ConfigKey::DiscoveredEggs => value
                .as_object()?
                .iter()
                .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect::<Option<IndexMap<_, _>>>()
                .map(ConfigValue::Eggs),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Versions(versions) => json!(versions),
            ConfigValue::Flag(flag) => Value::Bool(*flag),
            ConfigValue::Eggs(eggs) => Value::Object(
                eggs.iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// A config document after key normalization.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    /// `config` was literally `true`.
    pub enabled: bool,
    pub version: Option<String>,
    /// Recognized settings present in the document, in application order.
    pub entries: Vec<(ConfigKey, Value)>,
}

impl ConfigDocument {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let entries = ConfigKey::ALL
            .iter()
            .filter_map(|key| map.get(key.as_str()).map(|value| (*key, value.clone())))
            .collect();
        Self {
            enabled: map.get("config") == Some(&Value::Bool(true)),
            version: map.get("version").and_then(Value::as_str).map(str::to_string),
            entries,
        }
    }

    /// Serialized form of a single-setting document.
    pub fn single(key: ConfigKey, value: &ConfigValue, version: &str) -> Value {
        let mut map = Map::new();
        map.insert("config".into(), Value::Bool(true));
        map.insert("version".into(), Value::String(version.to_string()));
        map.insert(key.as_str().into(), value.to_json());
        Value::Object(map)
    }
}

/// Result of applying one config document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Settings set or overwritten.
    pub applied: usize,
    /// Setting whose conflict was declined; later settings were not looked at.
    pub aborted_at: Option<ConfigKey>,
}

/// Process-wide settings, owned by the session.
#[derive(Debug, Default, Clone)]
pub struct Configs {
    values: IndexMap<ConfigKey, ConfigValue>,
}

impl Configs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ConfigKey) -> Option<&ConfigValue> {
        self.values.get(&key)
    }

    pub fn set(&mut self, key: ConfigKey, value: ConfigValue) {
        self.values.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn ignored_versions(&self) -> &[String] {
        match self.get(ConfigKey::IgnoredVersion) {
            Some(ConfigValue::Versions(versions)) => versions,
            _ => &[],
        }
    }

    pub fn allow_command(&self) -> bool {
        matches!(self.get(ConfigKey::AllowCommand), Some(ConfigValue::Flag(true)))
    }

    pub fn debug_enabled(&self) -> bool {
        matches!(self.get(ConfigKey::EnableDebug), Some(ConfigValue::Flag(true)))
    }

    pub fn discovered_eggs(&self) -> Option<&IndexMap<String, String>> {
        match self.get(ConfigKey::DiscoveredEggs) {
            Some(ConfigValue::Eggs(eggs)) => Some(eggs),
            _ => None,
        }
    }

    /// Applies the recognized settings of `doc`.
    ///
    /// A setting that already holds a different value is only overwritten
    /// after the prompt agrees; a refusal stops the whole document.
    pub fn merge(
        &mut self,
        doc: &ConfigDocument,
        app_version: &str,
        prompt: &mut dyn Confirm,
    ) -> Result<MergeOutcome, ConfigError> {
        if !doc.enabled {
            error!("config document is not enabled or malformed, skipping");
            return Err(ConfigError::NotEnabled);
        }

        let version_ok = doc
            .version
            .as_deref()
            .is_some_and(|v| v == app_version || WILDCARD_VERSIONS.contains(&v));
        if !version_ok {
            let err = ConfigError::VersionMismatch {
                current: app_version.to_string(),
                found: doc.version.clone().unwrap_or_else(|| "<missing>".to_string()),
            };
            error!("{err}, skipping");
            return Err(err);
        }

        let mut outcome = MergeOutcome {
            applied: 0,
            aborted_at: None,
        };

        for (key, raw) in &doc.entries {
            let Some(value) = ConfigValue::from_json(*key, raw) else {
                warn!("config entry {key} has an unexpected value {raw}, skipping");
                continue;
            };
            info!("found config entry: {key} = {value}");

            match self.values.get(key) {
                Some(existing) if *existing == value => {
                    warn!("config entry {key} already set to {existing}, duplicate, skipped");
                }
                Some(existing) => {
                    warn!("config entry {key} already exists, old value {existing}, new value {value}, asking");
                    let detail = format!("entry: {key}\nold value: {existing}\nnew value: {value}");
                    let decision = prompt.ask_yes_no(
                        "Duplicate config entry",
                        "This config entry already exists. Overwrite it with the new value?",
                        Some(&detail),
                    );
                    if decision == Decision::No {
                        info!("config entry {key} keeps its old value {existing}");
                        outcome.aborted_at = Some(*key);
                        return Ok(outcome);
                    }
                    info!("config entry {key} overwritten with {value}");
                    self.values.insert(*key, value);
                    outcome.applied += 1;
                }
                None => {
                    info!("config entry {key} set to {value}");
                    self.values.insert(*key, value);
                    outcome.applied += 1;
                }
            }
        }

        info!("config document applied, {} entries changed", outcome.applied);
        Ok(outcome)
    }

    /// Writes the current value of `key` as a config document into `dir`.
    pub fn persist(&self, key: ConfigKey, dir: &Path, version: &str) -> std::io::Result<Option<PathBuf>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        fs::create_dir_all(dir)?;
        let path = dir.join(key.file_name());
        let doc = ConfigDocument::single(key, value, version);
        fs::write(&path, serde_json::to_string_pretty(&doc)?)?;
        info!("config saved to {}", path.display());
        Ok(Some(path))
    }
}
