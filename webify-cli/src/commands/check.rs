//! Sanity-check the index graph without building it.

use super::{load_config, print_diagnostics};
use anyhow::{Context, Result};
use std::path::Path;
use webify_core::Validator;

pub fn check_site(config_path: &Path, index: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let index = index.unwrap_or_else(|| config.index.clone());

    let diagnostics = Validator::new(config.source_root())
        .check(&index)
        .with_context(|| format!("Index {} failed validation", index))?;

    println!(
        "Check complete: {} ({} advisories)",
        index,
        diagnostics.len()
    );
    print_diagnostics(&diagnostics);
    Ok(())
}
