//! Build command implementation.

use super::{load_config, print_diagnostics};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};
use webify_core::{Config, Session};

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct BuildOverrides {
    pub index: Option<String>,
    pub output: Option<PathBuf>,
    pub baseurl: Option<String>,
    pub repo_full_name: Option<String>,
    pub templates: Option<PathBuf>,
}

impl BuildOverrides {
    fn apply(self, config: &mut Config) {
        if let Some(index) = self.index {
            config.index = index;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(baseurl) = self.baseurl {
            config.baseurl = baseurl;
        }
        if let Some(repo) = self.repo_full_name {
            config.repo_full_name = Some(repo);
        }
        if let Some(templates) = self.templates {
            config.templates = Some(templates);
        }
    }
}

/// Mirror the source tree and compile the root index into the output.
pub fn build_site(config_path: &Path, overrides: BuildOverrides) -> Result<()> {
    let mut config = load_config(config_path)?;
    overrides.apply(&mut config);

    tracing::info!(
        "baseurl: {:?}, repo_full_name: {:?}",
        config.baseurl,
        config.repo_full_name
    );

    let root = config.source_root();
    let output = config.output_dir();
    let mirrored = mirror_tree(&root, &output).context("Failed to mirror source tree")?;
    tracing::debug!("Mirrored {} files into {:?}", mirrored, output);

    let mut session = Session::new(config);
    let report = session.build_site().context("Failed to build site")?;

    tracing::info!("✓ Compiled {} documents", report.documents);
    tracing::info!("✓ Output written to {:?}", output);

    println!(
        "Build complete: {} documents, {} content pages, {} assets, {} search entries",
        report.documents, report.content_units, report.assets, report.search_entries
    );
    if !report.diagnostics.is_empty() {
        println!("{} advisories:", report.diagnostics.len());
        print_diagnostics(&report.diagnostics);
    }
    Ok(())
}

/// Copy every file under `root` into `output`, skipping the output
/// directory itself, hidden entries and files already present.
fn mirror_tree(root: &Path, output: &Path) -> Result<usize> {
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory {:?}", output))?;
    let output = output
        .canonicalize()
        .with_context(|| format!("Failed to resolve {:?}", output))?;

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !skip_entry(entry, &output));

    let mut copied = 0;
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root)?;
        let target = output.join(relative);
        if target.exists() {
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &target)
            .with_context(|| format!("Failed to copy {:?}", entry.path()))?;
        copied += 1;
    }
    Ok(copied)
}

fn skip_entry(entry: &DirEntry, output: &Path) -> bool {
    let hidden = entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'));
    hidden
        || (entry.file_type().is_dir()
            && entry
                .path()
                .canonicalize()
                .is_ok_and(|path| path == output))
}
