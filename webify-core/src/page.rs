//! Output artifacts: YAML data files and the stub pages that reference them.

use crate::error::Result;
use askama::Template;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Stub page of a top-level document.
#[derive(Template)]
#[template(path = "home.txt")]
pub struct HomePage<'a> {
    /// Data artifact name, without extension.
    pub index: &'a str,
}

/// Page of a rendered notebook or markdown file.
#[derive(Template)]
#[template(path = "content.txt")]
pub struct ContentPage<'a> {
    pub metadata: Option<&'a str>,
    pub colab: Option<&'a str>,
    pub body: &'a str,
}

/// Write a data artifact to `<output>/_data/<name>.yml`.
pub fn write_data(output: &Path, name: &str, value: &Value) -> Result<PathBuf> {
    let path = output.join("_data").join(format!("{}.yml", name));
    let yaml = serde_yaml::to_string(value)?;
    write_file(&path, &yaml)?;
    info!(path = %path.display(), "wrote data");
    Ok(path)
}

/// Render `page` to `path`.
pub fn write_page<T: Template>(path: &Path, page: &T) -> Result<()> {
    let text = page.render()?;
    write_file(path, &text)?;
    info!(path = %path.display(), "wrote page");
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}
