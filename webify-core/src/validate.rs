//! Read-only sanity check of an index graph.
//!
//! Walks the same documents a build would, without rendering or writing
//! anything. Errors abort at the first offending node; softer findings are
//! collected as diagnostics.

use crate::assets::is_local_reference;
use crate::error::{BuildError, Result};
use crate::link::discriminators;
use crate::models::Diagnostic;
use crate::resolve::{resolve_patches, FsLoader};
use crate::slug::{join_path, normalize_path, parent_dir, with_yaml_extension};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub struct Validator {
    root: PathBuf,
    loader: FsLoader,
    visited: HashSet<String>,
    stack: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            loader: FsLoader::new(&root),
            root,
            visited: HashSet::new(),
            stack: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Validate the index at `index` and everything it references.
    pub fn check(mut self, index: &str) -> Result<Vec<Diagnostic>> {
        self.validate_file(index)?;
        Ok(self.diagnostics)
    }

    fn validate_file(&mut self, path: &str) -> Result<()> {
        let file = normalize_path(&with_yaml_extension(path));
        if !self.root.join(&file).is_file() {
            return Err(BuildError::missing("Index file", file));
        }
        if !self.visited.insert(file.clone()) {
            debug!(file = %file, "already checked");
            return Ok(());
        }
        info!(file = %file, "checking");

        let text = std::fs::read_to_string(self.root.join(&file))?;
        let document = if text.trim().is_empty() {
            Value::Mapping(Mapping::new())
        } else {
            serde_yaml::from_str(&text)?
        };
        let document = resolve_patches(document, &self.loader)?;

        self.stack.push(file);
        let result = self.validate_index(&document);
        self.stack.pop();
        result
    }

    fn validate_index(&mut self, index: &Value) -> Result<()> {
        let Value::Mapping(map) = index else {
            return Err(BuildError::malformed(
                "index is supposed to be a mapping",
                index,
            ));
        };

        for (key, value) in map {
            let value = resolve_patches(value.clone(), &self.loader)?;
            match &value {
                Value::Sequence(_) if key.as_str() == Some("chapters") => {
                    self.validate_chapters(&value)?
                }
                Value::Sequence(links) => {
                    for link in links {
                        self.validate_link(link, "Link")?;
                    }
                }
                Value::Mapping(object) => self.validate_object(object, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn validate_object(&mut self, object: &Mapping, value: &Value) -> Result<()> {
        let kind = object.get("kind").and_then(Value::as_str);
        let content = object.get("content");
        match (kind, content) {
            (Some("chapters"), Some(chapters)) => self.validate_chapters(chapters),
            (Some("people"), Some(Value::Sequence(people))) => {
                for person in people {
                    self.validate_author(person)?;
                }
                Ok(())
            }
            (_, Some(Value::Sequence(links))) => {
                for link in links {
                    self.validate_link(link, "Link")?;
                }
                Ok(())
            }
            (_, Some(link @ Value::Mapping(_))) => self.validate_link(link, "Link"),
            (_, Some(_)) => Ok(()),
            (_, None) => self.validate_link(value, "Link"),
        }
    }

    fn validate_chapters(&mut self, chapters: &Value) -> Result<()> {
        let Value::Sequence(chapters) = chapters else {
            return Err(BuildError::malformed(
                "chapters content must be a list",
                chapters,
            ));
        };
        for chapter in chapters {
            let chapter = resolve_patches(chapter.clone(), &self.loader)?;
            let sole_index = chapter
                .as_mapping()
                .filter(|map| map.len() == 1)
                .and_then(|map| map.get("index"))
                .and_then(Value::as_str);
            match sole_index {
                Some(path) => self.validate_file(path)?,
                None => self.validate_index(&chapter)?,
            }
        }
        Ok(())
    }

    fn validate_link(&mut self, link: &Value, object: &str) -> Result<()> {
        let link = resolve_patches(link.clone(), &self.loader)?;
        let Value::Mapping(map) = &link else {
            return Err(BuildError::malformed(
                format!("{} object is supposed to be a mapping", object),
                &link,
            ));
        };

        let present = discriminators(map);
        if present.len() > 1 {
            return Err(BuildError::malformed(
                format!(
                    "{} object has {} targets ({}), expected exactly one",
                    object,
                    present.len(),
                    present.join(", ")
                ),
                &link,
            ));
        }

        match present.first().map(String::as_str) {
            Some("notebook") => self.validate_notebook(map, &link, object),
            Some("md") => {
                let target = string_field(map, "md", &link)?;
                if is_local_reference(target) {
                    self.content_file(target, "md", "Markdown file")?;
                }
                Ok(())
            }
            Some("index") => {
                let target = string_field(map, "index", &link)?;
                self.validate_file(target)
            }
            Some("pdf") => {
                let target = string_field(map, "pdf", &link)?;
                let path = normalize_path(target);
                if is_local_reference(target) && !self.root.join(&path).is_file() {
                    return Err(BuildError::missing("PDF file", path));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn validate_notebook(&mut self, map: &Mapping, link: &Value, object: &str) -> Result<()> {
        let target = string_field(map, "notebook", link)?;
        if !is_local_reference(target) {
            return Ok(());
        }
        let dir = self.content_file(target, "ipynb", "Notebook")?;

        let metadata_path = match map.get("metadata").and_then(Value::as_str) {
            Some(path) => path.to_string(),
            None => join_path(&dir, "metadata.yml"),
        };
        let metadata_path = normalize_path(&with_yaml_extension(&metadata_path));
        if !self.root.join(&metadata_path).is_file() {
            if !map.contains_key("text") && !map.contains_key("icon") {
                return Err(BuildError::malformed(
                    format!(
                        "no text or icon is provided for notebook {} in {} object with no metadata",
                        target,
                        object.to_lowercase()
                    ),
                    link,
                ));
            }
            self.advise(
                "notebook.metadata",
                format!(
                    "metadata file {} for notebook {} could not be found",
                    metadata_path, target
                ),
            );
            return Ok(());
        }

        let text = std::fs::read_to_string(self.root.join(&metadata_path))?;
        let metadata: Value = serde_yaml::from_str(&text)?;
        let metadata = resolve_patches(metadata, &self.loader)?;
        let Value::Mapping(metadata) = metadata else {
            return Err(BuildError::malformed(
                format!("metadata for notebook {} must be a mapping", target),
                &metadata,
            ));
        };

        let authors = match metadata.get("authors") {
            Some(Value::Mapping(authors)) => authors.get("content").cloned(),
            other => other.cloned(),
        };
        match authors {
            Some(Value::Sequence(authors)) if !authors.is_empty() => {
                for author in &authors {
                    self.validate_author(author)?;
                }
            }
            _ => self.advise(
                "notebook.authors",
                format!("no author was specified for notebook {}", target),
            ),
        }
        Ok(())
    }

    fn validate_author(&mut self, author: &Value) -> Result<()> {
        let Value::Mapping(map) = author else {
            return Err(BuildError::malformed(
                "author is expected to be a mapping",
                author,
            ));
        };
        let Some(name) = map.get("name").and_then(Value::as_str) else {
            return Err(BuildError::malformed("author must contain a name", author));
        };

        let has_role = map.contains_key("role")
            || map
                .get("roles")
                .and_then(Value::as_sequence)
                .is_some_and(|roles| !roles.is_empty());
        if !has_role {
            self.advise("person.role", format!("no role specified for {}", name));
        }

        match map.get("contact") {
            Some(Value::Sequence(contacts)) => {
                for contact in contacts {
                    self.validate_link(contact, "Contact")?;
                }
            }
            Some(_) => {}
            None => self.advise(
                "person.contact",
                format!("no contact information for {}", name),
            ),
        }
        Ok(())
    }

    /// Resolve a content target to its file and return the content directory.
    fn content_file(&self, target: &str, extension: &str, what: &str) -> Result<String> {
        let target = normalize_path(target);
        if self.root.join(&target).is_file() {
            return Ok(parent_dir(&target).to_string());
        }
        let file = join_path(&target, &format!("index.{}", extension));
        if self.root.join(&file).is_file() {
            return Ok(target);
        }
        Err(BuildError::missing(what, file))
    }

    fn advise(&mut self, code: &str, message: String) {
        warn!(code, "{}", message);
        let source = self.stack.last().cloned();
        self.diagnostics.push(Diagnostic::warning(code, message, source));
    }
}

fn string_field<'a>(map: &'a Mapping, key: &str, link: &Value) -> Result<&'a str> {
    map.get(key).and_then(Value::as_str).ok_or_else(|| {
        BuildError::malformed(format!("link field `{}` must be a string", key), link)
    })
}
