//! Configuration parsing and management.

use crate::slug::normalize_baseurl;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Run configuration matching the webify.yml schema.
///
/// Every field is optional in the file; command line flags override
/// whatever was loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root index document, relative to the source root.
    pub index: String,

    /// Output directory.
    pub output: PathBuf,

    /// Site baseurl, e.g. the repository name for project pages.
    pub baseurl: String,

    /// `user/repo`, used to build Colab links for notebooks.
    pub repo_full_name: Option<String>,

    /// Asset area inside the output directory.
    pub assets_dir: String,

    /// Runtime templates for the `template` directive.
    pub templates: Option<PathBuf>,

    pub markdown_extensions: Vec<String>,

    // Directory the source paths are relative to
    #[serde(skip)]
    root: Option<PathBuf>,
}

fn default_markdown_extensions() -> Vec<String> {
    [
        "md_in_html",
        "codehilite",
        "fenced_code",
        "tables",
        "attr_list",
        "footnotes",
        "def_list",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index: "index.yml".to_string(),
            output: PathBuf::from("webified"),
            baseurl: String::new(),
            repo_full_name: None,
            assets_dir: "assets".to_string(),
            templates: None,
            markdown_extensions: default_markdown_extensions(),
            root: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file; the source root is the file's
    /// directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents)?
        };
        config.root = Some(
            path.parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        );
        Ok(config)
    }

    /// Load `path` when it exists, else defaults rooted at `fallback_root`.
    pub fn load_or_default<P: AsRef<Path>>(
        path: P,
        fallback_root: &Path,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default().with_root(fallback_root))
        }
    }

    pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Directory every document and asset path is relative to.
    pub fn source_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Output directory, resolved against the source root.
    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.output)
    }

    /// Templates directory; `_templates` under the source root by default.
    pub fn templates_dir(&self) -> PathBuf {
        match &self.templates {
            Some(dir) => self.resolve_path(dir),
            None => self.source_root().join("_templates"),
        }
    }

    /// Baseurl without surrounding slashes ("" for user pages).
    pub fn normalized_baseurl(&self) -> String {
        normalize_baseurl(&self.baseurl)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.source_root().join(path)
        }
    }
}
