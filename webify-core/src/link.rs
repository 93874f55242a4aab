//! Link descriptors and their classification.

use crate::error::{BuildError, Result};
use serde_yaml::{Mapping, Value};

/// Keys that name a link's media source.
pub const MEDIA_KEYS: &[&str] = &["notebook", "md", "index", "pdf"];

/// `kind` values that select a builder of their own.
pub const KIND_DISCRIMINATORS: &[&str] = &["person", "people", "chapters"];

/// What a link points at, decided once from its discriminator keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Notebook(String),
    Markdown(String),
    SubIndex(String),
    Pdf(String),
    Person,
    People,
    Chapters,
    /// Raw `link` target.
    Plain(String),
}

/// Every discriminator present on a link: media keys, then `link`, then a
/// `kind` that selects its own builder (`kind: person`).
///
/// Any other `kind` value is a display label and does not count.
pub fn discriminators(link: &Mapping) -> Vec<String> {
    let mut present: Vec<String> = MEDIA_KEYS
        .iter()
        .chain(std::iter::once(&"link"))
        .filter(|key| link.contains_key(**key))
        .map(|key| key.to_string())
        .collect();
    if let Some(kind) = link
        .get("kind")
        .and_then(Value::as_str)
        .filter(|kind| KIND_DISCRIMINATORS.contains(kind))
    {
        present.push(format!("kind: {}", kind));
    }
    present
}

impl LinkKind {
    /// Classify a link mapping. Exactly one discriminator must be present.
    pub fn classify(link: &Mapping) -> Result<Self> {
        let present = discriminators(link);
        let key = match present.as_slice() {
            [] => {
                return Err(BuildError::malformed(
                    "link has no target",
                    &Value::Mapping(link.clone()),
                ))
            }
            [key] => key.as_str(),
            _ => {
                return Err(BuildError::malformed(
                    format!(
                        "link has {} targets ({}), expected exactly one",
                        present.len(),
                        present.join(", ")
                    ),
                    &Value::Mapping(link.clone()),
                ))
            }
        };

        Ok(match key {
            "notebook" => LinkKind::Notebook(media_target(link, key)?),
            "md" => LinkKind::Markdown(media_target(link, key)?),
            "index" => LinkKind::SubIndex(media_target(link, key)?),
            "pdf" => LinkKind::Pdf(media_target(link, key)?),
            "link" => match link.get("link") {
                Some(Value::String(target)) => LinkKind::Plain(target.clone()),
                _ => {
                    return Err(BuildError::malformed(
                        "link target must be a string",
                        &Value::Mapping(link.clone()),
                    ))
                }
            },
            "kind: person" => LinkKind::Person,
            "kind: people" => LinkKind::People,
            _ => LinkKind::Chapters,
        })
    }

    pub fn is_person(&self) -> bool {
        matches!(self, LinkKind::Person)
    }
}

fn media_target(link: &Mapping, key: &str) -> Result<String> {
    match link.get(key) {
        Some(Value::String(target)) => Ok(target.clone()),
        _ => Err(BuildError::malformed(
            format!("`{}` must name a file", key),
            &Value::Mapping(link.clone()),
        )),
    }
}
