//! Small shared types: document kinds, search settings, diagnostics.

use crate::error::{BuildError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Role a compiled document plays in the output site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Top-level page; gets a stub page next to its data artifact.
    #[default]
    Index,
    /// Sidecar metadata of a notebook or markdown file.
    Content,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Index => "index",
            IndexKind::Content => "content",
        }
    }

    /// Capitalized name, used as the fallback document title.
    pub fn title(&self) -> &'static str {
        match self {
            IndexKind::Index => "Index",
            IndexKind::Content => "Content",
        }
    }
}

/// Whether a document's text and links feed the search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub content: bool,
    pub links: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            content: true,
            links: false,
        }
    }
}

impl SearchSettings {
    /// Parse a `search:` value: a boolean toggles both, a mapping sets each.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(enabled) => Ok(Self {
                content: *enabled,
                links: *enabled,
            }),
            Value::Mapping(map) => {
                let defaults = Self::default();
                Ok(Self {
                    content: flag(map, "content")?.unwrap_or(defaults.content),
                    links: flag(map, "links")?.unwrap_or(defaults.links),
                })
            }
            other => Err(BuildError::malformed(
                "search settings must be a boolean or a mapping",
                other,
            )),
        }
    }

    pub fn any(&self) -> bool {
        self.content || self.links
    }

    pub fn to_value(self) -> Value {
        let mut map = Mapping::new();
        map.insert("content".into(), Value::Bool(self.content));
        map.insert("links".into(), Value::Bool(self.links));
        Value::Mapping(map)
    }
}

fn flag(map: &Mapping, key: &str) -> Result<Option<bool>> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(BuildError::malformed(
            format!("search.{} must be a boolean", key),
            other,
        )),
    }
}

/// Severity for non-fatal diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Warning,
}

impl DiagnosticSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticSeverity::Warning => "warning",
        }
    }
}

/// A finding that is reported but never aborts a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable identifier, e.g. `person.contact`.
    pub code: String,
    pub message: String,
    pub severity: DiagnosticSeverity,
    /// Document being compiled when the diagnostic was raised.
    #[serde(default)]
    pub source_path: Option<String>,
}

impl Diagnostic {
    pub fn warning(
        code: impl Into<String>,
        message: impl Into<String>,
        source_path: Option<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity: DiagnosticSeverity::Warning,
            source_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_settings_from_bool() {
        let settings = SearchSettings::from_value(&Value::Bool(true)).unwrap();
        assert!(settings.content && settings.links);
        let settings = SearchSettings::from_value(&Value::Bool(false)).unwrap();
        assert!(!settings.any());
    }

    #[test]
    fn test_search_settings_partial_mapping() {
        let value: Value = serde_yaml::from_str("links: true").unwrap();
        let settings = SearchSettings::from_value(&value).unwrap();
        assert_eq!(
            settings,
            SearchSettings {
                content: true,
                links: true
            }
        );
    }

    #[test]
    fn test_search_settings_rejects_strings() {
        let value = Value::String("yes".into());
        assert!(SearchSettings::from_value(&value).is_err());
    }

    #[test]
    fn test_index_kind_titles() {
        assert_eq!(IndexKind::Index.title(), "Index");
        assert_eq!(IndexKind::Content.as_str(), "content");
    }

    #[test]
    fn test_diagnostic_serializes_severity() {
        let diag = Diagnostic::warning("person.role", "no role", Some("index.yml".into()));
        let yaml = serde_yaml::to_string(&diag).unwrap();
        assert!(yaml.contains("severity: warning"));
        assert_eq!(diag.severity.as_str(), "warning");
        let back: Diagnostic = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, diag);
    }
}
