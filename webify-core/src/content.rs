//! Content units: notebooks and markdown files rendered to their own page.

use crate::assets::AssetContext;
use crate::builder::{CompileOptions, ContentKind, IndexSource, Session};
use crate::error::{BuildError, Result};
use crate::models::IndexKind;
use crate::page::{self, ContentPage};
use crate::search::html_to_text;
use crate::slug::{
    data_name, join_path, normalize_path, parent_dir, prepend_baseurl, remove_ending,
    with_yaml_extension,
};
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

const COLAB_BASE: &str = "https://colab.research.google.com/github";

/// Source file of a content unit and the directory its assets live in.
struct ContentSource {
    file: String,
    dir: String,
}

impl Session {
    fn locate_content(&self, target: &str, kind: ContentKind) -> Result<ContentSource> {
        let target = normalize_path(target);
        let root = self.source_root();
        if root.join(&target).is_file() {
            return Ok(ContentSource {
                dir: parent_dir(&target).to_string(),
                file: target,
            });
        }
        let file = join_path(&target, &format!("index.{}", kind.extension()));
        if root.join(&file).is_file() {
            return Ok(ContentSource { file, dir: target });
        }
        let what = match kind {
            ContentKind::Notebook => "Notebook",
            ContentKind::Markdown => "Markdown file",
        };
        Err(BuildError::missing(what, file))
    }

    /// Render a notebook or markdown file once and return its link record.
    pub(crate) fn build_content_unit(
        &mut self,
        mut link: Mapping,
        target: &str,
        kind: ContentKind,
        register: bool,
    ) -> Result<Mapping> {
        let source = self.locate_content(target, kind)?;
        if let Some(previous) = self.content_units.get(&source.file) {
            debug!(file = %source.file, "content already rendered");
            return Ok(previous.clone());
        }
        info!(kind = kind.name(), file = %source.file, "rendering content");

        let ending = format!(".{}", kind.extension());
        let page_path = format!("{}.html", remove_ending(&source.file, &[ending.as_str()]));
        let url = prepend_baseurl(&page_path, Some(self.baseurl()), true);
        link.insert(Value::from("link"), Value::String(url.clone()));
        link.insert(Value::from("kind"), Value::from(kind.name()));
        self.content_units.insert(source.file.clone(), link.clone());

        let assets = AssetContext::new(Some(source.dir.clone()), self.config().assets_dir.clone());
        let metadata = self.content_metadata(&mut link, &source, &assets)?;
        self.content_units.insert(source.file.clone(), link.clone());

        let raw = std::fs::read_to_string(self.source_root().join(&source.file))?;
        let body = match kind {
            ContentKind::Notebook => {
                let html = self.notebooks.export(&raw, &self.markdown)?;
                self.rewrite_html(&html, &assets, false)?
            }
            ContentKind::Markdown => self.render_markdown(&raw, &assets)?,
        };

        let colab = match (kind, &self.config().repo_full_name) {
            (ContentKind::Notebook, Some(repo)) => Some(format!(
                "{}/{}/blob/master/{}",
                COLAB_BASE, repo, source.file
            )),
            _ => None,
        };
        let output = self.output_dir().join(&page_path);
        page::write_page(
            &output,
            &ContentPage {
                metadata: metadata.as_deref(),
                colab: colab.as_deref(),
                body: &body,
            },
        )?;
        self.record_artifact(output);

        if register {
            self.register_link(&link);
            self.search.add_content(&url, &html_to_text(&body));
        }
        Ok(link)
    }

    /// Compile the unit's sidecar metadata, copying its title and
    /// description onto the link. Returns the metadata artifact name.
    fn content_metadata(
        &mut self,
        link: &mut Mapping,
        source: &ContentSource,
        assets: &AssetContext,
    ) -> Result<Option<String>> {
        let path = match link.get("metadata").and_then(Value::as_str) {
            Some(path) => path.to_string(),
            None => join_path(&source.dir, "metadata.yml"),
        };
        let path = normalize_path(&with_yaml_extension(&path));
        if !self.source_root().join(&path).is_file() {
            return Ok(None);
        }

        let metadata = self.compile(
            IndexSource::File(path.clone()),
            CompileOptions::default()
                .with_kind(IndexKind::Content)
                .with_assets(assets.clone()),
        )?;

        if !link.contains_key("text") {
            let title = metadata
                .get("header")
                .and_then(|h| h.get("title"))
                .or_else(|| metadata.get("title"))
                .cloned();
            if let Some(title) = title {
                link.insert(Value::from("text"), title);
            }
        }
        if !link.contains_key("description") {
            if let Some(description) = metadata.get("header").and_then(|h| h.get("description")) {
                link.insert(Value::from("description"), description.clone());
            }
        }
        Ok(Some(data_name(&path)))
    }
}
