//! CLI command implementations.

pub mod build;
pub mod check;

pub use build::{build_site, BuildOverrides};
pub use check::check_site;

use anyhow::{Context, Result};
use std::path::Path;
use webify_core::{Config, Diagnostic};

/// Load the config file if present, else defaults rooted at the working
/// directory.
pub(crate) fn load_config(config_path: &Path) -> Result<Config> {
    tracing::debug!("Loading config from {:?}", config_path);
    Config::load_or_default(config_path, Path::new("."))
        .with_context(|| format!("Failed to load configuration from {:?}", config_path))
}

pub(crate) fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        let source = diag
            .source_path
            .as_deref()
            .map(|s| format!(" [{}]", s))
            .unwrap_or_default();
        println!(
            "  {} {}{}: {}",
            diag.severity.as_str(),
            diag.code,
            source,
            diag.message
        );
    }
}
