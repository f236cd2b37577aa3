use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::models::TemplateRecord;

#[derive(Debug, Clone)]
struct IndexEntry {
    name: String,
    /// File the template was read from, if it came from disk.
    source: Option<PathBuf>,
}

/// Loaded templates plus the content-hash index used for deduplication and
/// sync change detection.
#[derive(Debug, Default)]
pub struct TemplateStore {
    records: Vec<TemplateRecord>,
    /// Content hash mapped to the template it came from.
    hash_index: IndexMap<String, IndexEntry>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every record and hash.
    pub fn clear(&mut self) {
        self.records.clear();
        self.hash_index.clear();
    }

    /// Appends `record` under `hash`.
    ///
    /// Returns the name already registered for `hash` and leaves the store
    /// untouched when the same content was loaded before.
    pub fn insert(
        &mut self,
        record: TemplateRecord,
        hash: String,
        source: Option<PathBuf>,
    ) -> Result<(), String> {
        if let Some(existing) = self.hash_index.get(&hash) {
            return Err(existing.name.clone());
        }
        self.hash_index.insert(
            hash,
            IndexEntry {
                name: record.name.clone(),
                source,
            },
        );
        self.records.push(record);
        Ok(())
    }

    pub fn contains_hash(&self, hash: &str) -> bool {
        self.hash_index.contains_key(hash)
    }

    pub fn name_for_hash(&self, hash: &str) -> Option<&str> {
        self.hash_index.get(hash).map(|e| e.name.as_str())
    }

    /// Whether any loaded template carries `name` as its display name.
    pub fn contains_name(&self, name: &str) -> bool {
        self.hash_index.values().any(|e| e.name == name)
    }

    /// File of the first loaded template named `name`.
    pub fn source_for_name(&self, name: &str) -> Option<&Path> {
        self.hash_index
            .values()
            .filter(|e| e.name == name)
            .find_map(|e| e.source.as_deref())
    }

    /// Display name of the template read from `path`.
    pub fn name_for_source(&self, path: &Path) -> Option<&str> {
        self.hash_index
            .values()
            .find(|e| e.source.as_deref() == Some(path))
            .map(|e| e.name.as_str())
    }

    pub fn get(&self, index: usize) -> Option<&TemplateRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[TemplateRecord] {
        &self.records
    }

    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(|r| r.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> TemplateRecord {
        TemplateRecord::new(name, "content", Vec::new())
    }

    #[test]
    fn insert_keeps_display_order() {
        let mut store = TemplateStore::new();
        store.insert(record("b"), "h1".into(), None).unwrap();
        store.insert(record("a"), "h2".into(), None).unwrap();
        assert_eq!(store.names(), vec!["b", "a"]);
        assert!(store.contains_name("a"));
        assert_eq!(store.name_for_hash("h1"), Some("b"));
    }

    #[test]
    fn duplicate_hash_is_refused() {
        let mut store = TemplateStore::new();
        store.insert(record("first"), "same".into(), None).unwrap();
        let err = store.insert(record("second"), "same".into(), None).unwrap_err();
        assert_eq!(err, "first");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn source_is_looked_up_by_name_and_path() {
        let mut store = TemplateStore::new();
        store.insert(record("memo"), "h0".into(), None).unwrap();
        store
            .insert(record("memo"), "h1".into(), Some(PathBuf::from("t/letters.json")))
            .unwrap();
        assert_eq!(store.source_for_name("memo"), Some(Path::new("t/letters.json")));
        assert_eq!(store.name_for_source(Path::new("t/letters.json")), Some("memo"));
        assert_eq!(store.source_for_name("other"), None);
    }

    #[test]
    fn clear_empties_both_sides() {
        let mut store = TemplateStore::new();
        store.insert(record("a"), "h".into(), None).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert!(!store.contains_hash("h"));
    }
}
