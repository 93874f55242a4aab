//! Site-wide search accumulator.
//!
//! One entry per slug. Links register entries as they are built and
//! documents feed plain text into them; the result is written once at the
//! end of the run as `_data/search.yml`.

use crate::slug::{remove_ending, DOCUMENT_ENDINGS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serialized form of one search entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub title: String,
    pub url: String,
    pub description: String,
    pub category: String,
    /// Collected text, joined with single spaces.
    pub content: String,
}

#[derive(Debug, Clone)]
struct Pending {
    slug: String,
    title: String,
    url: String,
    description: String,
    category: String,
    content: Vec<String>,
}

/// Insertion-ordered, deduplicated search entries.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    entries: Vec<Pending>,
    positions: HashMap<String, usize>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a slug the way every entry is keyed.
    pub fn normalize_slug(slug: &str) -> String {
        remove_ending(slug, DOCUMENT_ENDINGS)
    }

    /// Register an entry. The first registration of a slug wins.
    pub fn add_item(
        &mut self,
        slug: &str,
        url: &str,
        title: &str,
        description: Option<&str>,
        category: Option<&str>,
    ) {
        let slug = Self::normalize_slug(slug);
        if self.positions.contains_key(&slug) {
            return;
        }
        self.insert(Pending {
            slug,
            title: title.to_string(),
            url: url.to_string(),
            description: description.unwrap_or_default().to_string(),
            category: category.unwrap_or_default().to_string(),
            content: Vec::new(),
        });
    }

    /// Add a piece of text to a slug's content, creating the entry if needed.
    pub fn add_content(&mut self, slug: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let slug = Self::normalize_slug(slug);
        let pos = match self.positions.get(&slug) {
            Some(&pos) => pos,
            None => self.insert(Pending {
                title: slug.clone(),
                url: slug.clone(),
                slug,
                description: String::new(),
                category: String::new(),
                content: Vec::new(),
            }),
        };
        let content = &mut self.entries[pos].content;
        if !content.iter().any(|existing| existing == text) {
            content.push(text.to_string());
        }
    }

    fn insert(&mut self, entry: Pending) -> usize {
        let pos = self.entries.len();
        self.positions.insert(entry.slug.clone(), pos);
        self.entries.push(entry);
        pos
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.positions.contains_key(&Self::normalize_slug(slug))
    }

    pub fn get(&self, slug: &str) -> Option<SearchEntry> {
        self.positions
            .get(&Self::normalize_slug(slug))
            .map(|&pos| finish(&self.entries[pos]))
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> Vec<(String, SearchEntry)> {
        self.entries
            .iter()
            .map(|entry| (entry.slug.clone(), finish(entry)))
            .collect()
    }

    /// Ordered YAML mapping `slug -> entry`.
    pub fn to_value(&self) -> Result<serde_yaml::Value, serde_yaml::Error> {
        let mut map = serde_yaml::Mapping::new();
        for (slug, entry) in self.entries() {
            map.insert(slug.into(), serde_yaml::to_value(entry)?);
        }
        Ok(serde_yaml::Value::Mapping(map))
    }
}

fn finish(entry: &Pending) -> SearchEntry {
    SearchEntry {
        title: entry.title.clone(),
        url: entry.url.clone(),
        description: entry.description.clone(),
        category: entry.category.clone(),
        content: entry.content.join(" "),
    }
}

/// Strip tags and decode the common entities, collapsing whitespace.
pub fn html_to_text(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;

    for ch in html.chars() {
        if ch == '<' {
            in_tag = true;
            result.push(' ');
        } else if ch == '>' {
            in_tag = false;
            result.push(' ');
        } else if !in_tag {
            result.push(ch);
        }
    }

    result
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
