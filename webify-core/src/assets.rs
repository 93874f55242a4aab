//! Copies locally referenced files into the output asset area.

use crate::error::{BuildError, Result};
use crate::slug::{join_path, normalize_path, prepend_baseurl};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Where asset references found in a piece of content are resolved from
/// and copied to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetContext {
    /// Directory the references are relative to (source root when `None`).
    pub src_dir: Option<String>,
    /// Directory under the output root the files are copied into.
    pub target_dir: String,
}

impl AssetContext {
    pub fn new(src_dir: Option<String>, target_dir: impl Into<String>) -> Self {
        Self {
            src_dir,
            target_dir: target_dir.into(),
        }
    }
}

/// Whether `src` points at a file inside the source tree.
pub fn is_local_reference(src: &str) -> bool {
    !(src.is_empty()
        || src.contains("://")
        || src.starts_with("data:")
        || src.starts_with("mailto:")
        || src.starts_with('/')
        || src.starts_with('#'))
}

#[derive(Debug)]
pub struct AssetRelocator {
    root: PathBuf,
    output: PathBuf,
    baseurl: String,
    copied: HashSet<String>,
}

impl AssetRelocator {
    pub fn new(root: impl Into<PathBuf>, output: impl Into<PathBuf>, baseurl: &str) -> Self {
        Self {
            root: root.into(),
            output: output.into(),
            baseurl: baseurl.to_string(),
            copied: HashSet::new(),
        }
    }

    /// Copy `src` into the asset area and return its site URL.
    ///
    /// Non-local references yield `None` and are left untouched by the
    /// caller. The copied file keeps its source-relative path under
    /// `ctx.target_dir`.
    pub fn relocate(&mut self, src: &str, ctx: &AssetContext) -> Result<Option<String>> {
        if !is_local_reference(src) {
            return Ok(None);
        }
        let relative = match &ctx.src_dir {
            Some(dir) => normalize_path(&join_path(dir, src)),
            None => normalize_path(src),
        };
        let source = self.root.join(&relative);
        if !source.is_file() {
            return Err(BuildError::missing("Asset", relative));
        }

        let target = join_path(&ctx.target_dir, &relative);
        if self.copied.insert(target.clone()) {
            let destination = self.output.join(&target);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&source, &destination)?;
            debug!(from = %relative, to = %target, "copied asset");
        }
        Ok(Some(prepend_baseurl(&target, Some(&self.baseurl), false)))
    }

    /// Number of distinct files copied so far.
    pub fn copied(&self) -> usize {
        self.copied.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_local_references() {
        assert!(!is_local_reference("https://example.com/a.png"));
        assert!(!is_local_reference("data:image/png;base64,AAAA"));
        assert!(!is_local_reference("/already/rooted.png"));
        assert!(!is_local_reference("#anchor"));
        assert!(is_local_reference("img/a.png"));
        assert!(is_local_reference("../shared/a.png"));
    }

    #[test]
    fn test_relocate_copies_once() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("lectures/one/img")).unwrap();
        std::fs::write(src.path().join("lectures/one/img/a.png"), b"png").unwrap();

        let mut relocator = AssetRelocator::new(src.path(), out.path(), "course");
        let ctx = AssetContext::new(Some("lectures/one".into()), "assets");
        let url = relocator.relocate("img/a.png", &ctx).unwrap().unwrap();
        assert_eq!(url, "/course/assets/lectures/one/img/a.png");
        assert!(out.path().join("assets/lectures/one/img/a.png").is_file());

        let again = relocator.relocate("./img/a.png", &ctx).unwrap().unwrap();
        assert_eq!(again, url);
        assert_eq!(relocator.copied(), 1);
    }

    #[test]
    fn test_relocate_remote_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut relocator = AssetRelocator::new(dir.path(), dir.path().join("out"), "");
        let ctx = AssetContext::new(None, "assets");
        assert_eq!(relocator.relocate("https://x.org/a.png", &ctx).unwrap(), None);
    }

    #[test]
    fn test_relocate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut relocator = AssetRelocator::new(dir.path(), dir.path().join("out"), "");
        let ctx = AssetContext::new(None, "assets");
        let err = relocator.relocate("nope.png", &ctx).unwrap_err();
        assert!(err.is_missing_resource());
    }
}
