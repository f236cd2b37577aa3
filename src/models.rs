use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::ConfigDocument;
use crate::error::LoadError;

/// Extension a file name must contain to be considered a template.
pub const TEMPLATE_EXTENSION: &str = ".json";

/// Keys every template document must carry, in reporting order.
pub const REQUIRED_KEYS: [&str; 4] = ["name", "content", "rolename", "roledes"];

/// One placeholder of a template and what it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    /// Literal text replaced in the template content.
    pub text: String,
    /// Human-readable meaning shown next to the keyword.
    pub description: String,
}

/// A loaded template ready for selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRecord {
    /// Display name, not required to be unique.
    pub name: String,
    /// Raw template body.
    pub content: String,
    /// Placeholders in display order.
    pub keywords: Vec<Keyword>,
}

impl TemplateRecord {
    pub fn new(name: impl Into<String>, content: impl Into<String>, keywords: Vec<Keyword>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            keywords,
        }
    }

    /// Placeholder texts, parallel to [`TemplateRecord::descriptions`].
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|k| k.text.as_str())
    }

    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|k| k.description.as_str())
    }
}

/// Template document after key normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDocument {
    pub name: String,
    pub content: String,
    pub rolename: Vec<String>,
    pub roledes: Vec<String>,
}

impl TemplateDocument {
    /// Pairs keywords with descriptions by position.
    ///
    /// Extra entries on the longer side are dropped.
    pub fn into_record(self) -> TemplateRecord {
        if self.rolename.len() != self.roledes.len() {
            warn!(
                "template {} has {} keywords but {} descriptions, extra entries ignored",
                self.name,
                self.rolename.len(),
                self.roledes.len()
            );
        }
        let keywords = self
            .rolename
            .into_iter()
            .zip(self.roledes)
            .map(|(text, description)| Keyword { text, description })
            .collect();
        TemplateRecord::new(self.name, self.content, keywords)
    }
}

/// A parsed candidate file.
#[derive(Debug, Clone)]
pub enum Document {
    Template(TemplateDocument),
    Config(ConfigDocument),
}

/// Lower-cases every top-level key. When several keys fold to the same name
/// the one appearing last in the file wins.
pub fn normalize_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect()
}

/// Decodes, normalizes and classifies the raw bytes of one file.
pub fn parse_document(bytes: &[u8], display: &str) -> Result<Document, LoadError> {
    let text =
        std::str::from_utf8(bytes).map_err(|_| LoadError::InvalidEncoding(display.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let value: Value =
        serde_json::from_str(text).map_err(|_| LoadError::InvalidJson(display.to_string()))?;
    let Value::Object(map) = value else {
        return Err(LoadError::InvalidJson(display.to_string()));
    };
    let map = normalize_keys(map);

    if map.contains_key("config") {
        return Ok(Document::Config(ConfigDocument::from_map(&map)));
    }

    let missing: Vec<&'static str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| !map.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingKeys {
            path: display.to_string(),
            keys: missing,
        });
    }

    let document = serde_json::from_value(Value::Object(map)).map_err(|e| LoadError::InvalidField {
        path: display.to_string(),
        message: e.to_string(),
    })?;
    Ok(Document::Template(document))
}

/// One file in the remote template directory, as listed by the GitHub
/// contents API.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEntry {
    /// File name including extension.
    pub name: String,
    /// Git blob id of the file.
    pub sha: String,
    pub size: u64,
    pub download_url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, sha: impl Into<String>, size: u64, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sha: sha.into(),
            size,
            download_url: Some(url.into()),
            kind: "file".to_string(),
        }
    }

    /// Display name the template is expected to carry locally.
    pub fn template_name(&self) -> String {
        self.name.replace(TEMPLATE_EXTENSION, "")
    }
}

/// Latest published release of the application.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub size: u64,
    pub browser_download_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(doc: Document) -> TemplateDocument {
        match doc {
            Document::Template(t) => t,
            Document::Config(_) => panic!("expected a template document"),
        }
    }

    #[test]
    fn keys_are_case_insensitive() {
        let bytes = br#"{"Name": "Greeting", "CONTENT": "Hi NAME", "RoleName": ["NAME"], "roleDes": ["who"]}"#;
        let doc = template(parse_document(bytes, "greeting.json").unwrap());
        assert_eq!(doc.name, "Greeting");
        assert_eq!(doc.rolename, vec!["NAME"]);
    }

    #[test]
    fn missing_keys_are_all_reported_in_order() {
        let err = parse_document(br#"{"name": "x"}"#, "x.json").unwrap_err();
        match err {
            LoadError::MissingKeys { keys, .. } => {
                assert_eq!(keys, vec!["content", "rolename", "roledes"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_and_non_object_files_are_invalid_json() {
        assert!(matches!(parse_document(b"", "a.json"), Err(LoadError::InvalidJson(_))));
        assert!(matches!(parse_document(b"[1, 2]", "a.json"), Err(LoadError::InvalidJson(_))));
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let err = parse_document(&[0x7b, 0xff, 0xfe, 0x7d], "a.json").unwrap_err();
        assert!(matches!(err, LoadError::InvalidEncoding(_)));
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let bytes = br#"{"name": "x", "content": "c", "rolename": "A", "roledes": []}"#;
        assert!(matches!(
            parse_document(bytes, "x.json"),
            Err(LoadError::InvalidField { .. })
        ));
    }

    #[test]
    fn byte_order_mark_is_skipped() {
        let mut bytes = "\u{feff}".as_bytes().to_vec();
        bytes.extend_from_slice(br#"{"name": "x", "content": "c", "rolename": [], "roledes": []}"#);
        assert!(matches!(parse_document(&bytes, "x.json"), Ok(Document::Template(_))));
    }

    #[test]
    fn config_marker_routes_to_config() {
        let bytes = br#"{"Config": true, "version": "*", "allow_command": true}"#;
        assert!(matches!(parse_document(bytes, "c.json"), Ok(Document::Config(_))));
    }

    #[test]
    fn record_zips_keywords_with_descriptions() {
        let doc = TemplateDocument {
            name: "t".into(),
            content: "A B".into(),
            rolename: vec!["A".into(), "B".into(), "C".into()],
            roledes: vec!["first".into(), "second".into()],
        };
        let record = doc.into_record();
        assert_eq!(record.keywords().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(record.descriptions().collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn remote_name_drops_extension() {
        let entry = RemoteEntry::file("Daily.json", "abc", 10, "https://example.com/Daily.json");
        assert_eq!(entry.template_name(), "Daily");
    }
}
