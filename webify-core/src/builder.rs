//! The content-graph compiler.
//!
//! A [`Session`] walks a root index document depth-first, expanding macro
//! directives, building links and nested objects, rendering content units
//! and emitting one data artifact per file-backed document. Documents are
//! compiled at most once per session; re-entry returns the cached result.

use crate::{
    assets::{AssetContext, AssetRelocator},
    config::Config,
    error::{BuildError, Result},
    link::LinkKind,
    markdown::MarkdownProcessor,
    models::{Diagnostic, IndexKind, SearchSettings},
    notebook::NotebookExporter,
    page::{self, HomePage},
    resolve::{apply_subs, resolve_patches, FsLoader},
    search::{html_to_text, SearchIndex},
    slug::{
        data_name, normalize_path, prepend_baseurl, remove_ending, with_yaml_extension,
        DOCUMENT_ENDINGS,
    },
    template::TemplateEngine,
};
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Keys of a document body that are not built as objects.
pub const INDEX_SPECIAL_KEYS: &[&str] = &["title", "nav", "meta", "config", "search"];

const YAML_ENDINGS: &[&str] = &[".yml", ".yaml"];

/// Where a document comes from.
#[derive(Debug, Clone)]
pub enum IndexSource {
    /// Path relative to the source root; `.yml` is appended when missing.
    File(String),
    /// Already-loaded document, compiled without emitting artifacts.
    Inline(Value),
}

/// Per-call compilation options.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Data file name to emit under instead of the source path.
    pub target: Option<String>,
    pub kind: IndexKind,
    /// Asset directories; the source root and the configured asset dir
    /// when unset.
    pub assets: Option<AssetContext>,
    /// Search entry that inline documents feed their text into.
    pub search_slug: Option<String>,
    /// Search flags for inline documents; run defaults when unset.
    pub search: Option<SearchSettings>,
    /// Whether this is the root document of the run.
    pub root: bool,
}

impl CompileOptions {
    pub fn root(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            root: true,
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: IndexKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_assets(mut self, assets: AssetContext) -> Self {
        self.assets = Some(assets);
        self
    }
}

/// State threaded through object and link building.
#[derive(Debug, Clone)]
pub(crate) struct BuildContext {
    pub image_key: Option<&'static str>,
    pub assets: AssetContext,
    /// Search entry receiving text; `None` when content search is off.
    pub search_slug: Option<String>,
    /// Whether built links register their own search entries.
    pub search_links: bool,
}

impl BuildContext {
    fn with_image_key(&self, image_key: Option<&'static str>) -> Self {
        Self {
            image_key,
            ..self.clone()
        }
    }

    fn without_search(&self) -> Self {
        Self {
            search_slug: None,
            search_links: false,
            ..self.clone()
        }
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub documents: usize,
    pub content_units: usize,
    pub assets: usize,
    pub search_entries: usize,
    pub artifacts: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

/// One compilation run.
pub struct Session {
    config: Config,
    root: PathBuf,
    output: PathBuf,
    baseurl: String,
    loader: FsLoader,
    pub(crate) relocator: AssetRelocator,
    pub(crate) markdown: MarkdownProcessor,
    pub(crate) notebooks: NotebookExporter,
    templates: TemplateEngine,
    visited: HashSet<String>,
    compiled: HashMap<String, Value>,
    pub(crate) content_units: HashMap<String, Mapping>,
    pub(crate) search: SearchIndex,
    search_defaults: SearchSettings,
    // (source stem, target stem) of the root document
    root_alias: Option<(String, String)>,
    diagnostics: Vec<Diagnostic>,
    stack: Vec<String>,
    artifacts: Vec<PathBuf>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let root = config.source_root();
        let output = config.output_dir();
        let baseurl = config.normalized_baseurl();
        let (markdown, unknown) =
            MarkdownProcessor::with_extensions(config.markdown_extensions.as_slice());
        let templates = TemplateEngine::new(config.templates_dir());

        let mut session = Self {
            loader: FsLoader::new(&root),
            relocator: AssetRelocator::new(&root, &output, &baseurl),
            markdown,
            notebooks: NotebookExporter::new(),
            templates,
            visited: HashSet::new(),
            compiled: HashMap::new(),
            content_units: HashMap::new(),
            search: SearchIndex::new(),
            search_defaults: SearchSettings::default(),
            root_alias: None,
            diagnostics: Vec::new(),
            stack: Vec::new(),
            artifacts: Vec::new(),
            config,
            root,
            output,
            baseurl,
        };
        for name in unknown {
            session.advise(
                "markdown.extension",
                format!("unknown markdown extension `{}` ignored", name),
            );
        }
        session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn search(&self) -> &SearchIndex {
        &self.search
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Every file written so far, in write order.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Compile the configured root index and write the search index.
    pub fn build_site(&mut self) -> Result<BuildReport> {
        let index = self.config.index.clone();
        self.compile(IndexSource::File(index), CompileOptions::root("index.yml"))?;
        self.write_search_index()?;
        Ok(BuildReport {
            documents: self.compiled.len(),
            content_units: self.content_units.len(),
            assets: self.relocator.copied(),
            search_entries: self.search.len(),
            artifacts: self.artifacts.clone(),
            diagnostics: self.diagnostics.clone(),
        })
    }

    /// Write the accumulated search entries to `<output>/_data/search.yml`.
    pub fn write_search_index(&mut self) -> Result<PathBuf> {
        let value = self.search.to_value()?;
        let path = page::write_data(&self.output, "search", &value)?;
        self.artifacts.push(path.clone());
        Ok(path)
    }

    /// Compile one document.
    pub fn compile(&mut self, source: IndexSource, options: CompileOptions) -> Result<Value> {
        match source {
            IndexSource::File(path) => self.compile_file(&path, &options),
            IndexSource::Inline(document) => {
                let settings = options.search.unwrap_or(self.search_defaults);
                let ctx = BuildContext {
                    image_key: None,
                    assets: self.asset_context(&options),
                    search_slug: options.search_slug.clone().filter(|_| settings.content),
                    search_links: settings.links,
                };
                self.compile_body(document, options.kind, &ctx)
            }
        }
    }

    fn asset_context(&self, options: &CompileOptions) -> AssetContext {
        options
            .assets
            .clone()
            .unwrap_or_else(|| AssetContext::new(None, self.config.assets_dir.clone()))
    }

    fn compile_file(&mut self, path: &str, options: &CompileOptions) -> Result<Value> {
        let file = normalize_path(&with_yaml_extension(path));
        let target = options
            .target
            .as_deref()
            .map(normalize_path)
            .unwrap_or_else(|| file.clone());

        if !self.root.join(&file).is_file() {
            return Err(BuildError::missing(
                format!("{} file", options.kind.title()),
                file,
            ));
        }

        if self.visited.contains(&file) {
            if let Some(done) = self.compiled.get(&file) {
                debug!(file = %file, "already compiled");
                return Ok(done.clone());
            }
            debug!(file = %file, "cyclic reference, returning source document");
            return self.load_document(&file);
        }
        self.visited.insert(file.clone());

        let mut document = self.load_document(&file)?;

        if options.root {
            self.root_alias = Some((
                remove_ending(&file, YAML_ENDINGS),
                remove_ending(&target, YAML_ENDINGS),
            ));
            self.capture_search_defaults(&mut document)?;
        }

        let slug = self.document_slug(&target);
        info!(kind = options.kind.as_str(), file = %file, slug = %slug, "processing");

        let settings = self.document_search(&mut document)?;
        if settings.any() {
            let title = header_field(&document, "title")
                .or_else(|| document.get("title").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| options.kind.title().to_string());
            let description = header_field(&document, "description");
            self.search
                .add_item(&slug, &slug, &title, description.as_deref(), None);
        }

        let ctx = BuildContext {
            image_key: None,
            assets: self.asset_context(options),
            search_slug: settings.content.then(|| slug.clone()),
            search_links: settings.links,
        };

        self.stack.push(file.clone());
        let built = self.compile_body(document, options.kind, &ctx);
        self.stack.pop();
        let built = built?;

        let name = data_name(&target);
        let data_path = page::write_data(&self.output, &name, &built)?;
        self.artifacts.push(data_path);
        if options.kind == IndexKind::Index {
            let page_path = self
                .output
                .join(format!("{}.html", remove_ending(&target, YAML_ENDINGS)));
            page::write_page(&page_path, &HomePage { index: &name })?;
            self.artifacts.push(page_path);
        }

        self.compiled.insert(file, built.clone());
        Ok(built)
    }

    fn load_document(&self, file: &str) -> Result<Value> {
        let text = std::fs::read_to_string(self.root.join(file))?;
        if text.trim().is_empty() {
            return Ok(Value::Mapping(Mapping::new()));
        }
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Run-wide search defaults from the root's `config.search`.
    fn capture_search_defaults(&mut self, document: &mut Value) -> Result<()> {
        let Some(map) = document.as_mapping_mut() else {
            return Ok(());
        };
        if let Some(config) = map.get_mut("config") {
            *config = resolve_patches(std::mem::take(config), &self.loader)?;
            if let Some(search) = config.get("search") {
                self.search_defaults = SearchSettings::from_value(search)?;
            }
        }
        Ok(())
    }

    /// Effective search settings of a document, normalized in place.
    fn document_search(&self, document: &mut Value) -> Result<SearchSettings> {
        let Some(map) = document.as_mapping_mut() else {
            return Ok(self.search_defaults);
        };
        let settings = match map.get_mut("search") {
            Some(search) => {
                *search = resolve_patches(std::mem::take(search), &self.loader)?;
                SearchSettings::from_value(search)?
            }
            None => self.search_defaults,
        };
        map.insert(Value::from("search"), settings.to_value());
        Ok(settings)
    }

    /// Site URL of a document, honouring the root alias.
    pub fn document_slug(&self, file: &str) -> String {
        let stem = remove_ending(&normalize_path(file), YAML_ENDINGS);
        let stem = match &self.root_alias {
            Some((source, target)) if *source == stem => target.clone(),
            _ => stem,
        };
        prepend_baseurl(
            &remove_ending(&stem, DOCUMENT_ENDINGS),
            Some(&self.baseurl),
            true,
        )
    }

    fn compile_body(&mut self, document: Value, kind: IndexKind, ctx: &BuildContext) -> Result<Value> {
        let document = resolve_patches(document, &self.loader)?;
        let mut map = match document {
            Value::Mapping(map) => map,
            other => {
                return Err(BuildError::malformed(
                    "index is supposed to be a mapping",
                    &other,
                ))
            }
        };

        if !map.contains_key("title") {
            if let Some(title) = map.get("header").and_then(|h| h.get("title")).cloned() {
                map.insert(Value::from("title"), title);
            }
        }
        for key in INDEX_SPECIAL_KEYS {
            if let Some(value) = map.get_mut(*key) {
                *value = resolve_patches(std::mem::take(value), &self.loader)?;
            }
        }

        let mut map = apply_subs(map, INDEX_SPECIAL_KEYS)?;

        if let Some(nav) = map.get_mut("nav") {
            *nav = self.build_nav(std::mem::take(nav), ctx)?;
        }
        if !map.contains_key("title") {
            map.insert(Value::from("title"), Value::from(kind.title()));
        }

        let body_ctx = ctx.with_image_key(Some("background"));
        for (key, value) in map.iter_mut() {
            if key.as_str().is_some_and(|k| INDEX_SPECIAL_KEYS.contains(&k)) {
                continue;
            }
            *value = self.build_object(std::mem::take(value), &body_ctx)?;
        }
        Ok(Value::Mapping(map))
    }

    fn build_nav(&mut self, nav: Value, ctx: &BuildContext) -> Result<Value> {
        let mut nav = match nav {
            Value::Mapping(nav) => nav,
            other => return self.build_object(other, ctx),
        };
        if let Some(brand) = nav.get_mut("brand") {
            *brand = self.build_link(std::mem::take(brand), ctx, ctx.search_links)?;
        }
        for key in ["content", "fixed"] {
            if let Some(value) = nav.get_mut(key) {
                *value = self.build_object(std::mem::take(value), ctx)?;
            }
        }
        Ok(Value::Mapping(nav))
    }

    /// Build a nested structure: lists hold links, mappings recurse, strings
    /// are markdown.
    pub(crate) fn build_object(&mut self, node: Value, ctx: &BuildContext) -> Result<Value> {
        let node = resolve_patches(node, &self.loader)?;
        match node {
            Value::Sequence(items) => {
                let mut built = Vec::with_capacity(items.len());
                for item in items {
                    built.push(self.build_link(item, ctx, ctx.search_links)?);
                }
                Ok(Value::Sequence(built))
            }
            Value::Mapping(map) => self.build_mapping(map, ctx),
            Value::String(text) => {
                let html = self.render_markdown(&text, &ctx.assets)?;
                if let Some(slug) = &ctx.search_slug {
                    self.search.add_content(slug, &html_to_text(&html));
                }
                Ok(Value::String(html))
            }
            other => Ok(other),
        }
    }

    fn build_mapping(&mut self, map: Mapping, ctx: &BuildContext) -> Result<Value> {
        let mut skip = vec!["label", "kind", "template"];
        skip.extend(ctx.image_key);
        let mut map = apply_subs(map, &skip)?;

        if map.contains_key("template") {
            return self.render_template(map, ctx);
        }

        let kind = map.get("kind").and_then(Value::as_str).map(str::to_string);
        match kind.as_deref() {
            Some("chapters") => self.build_chapters(&mut map, ctx)?,
            kind => {
                if kind == Some("people") {
                    if let Some(Value::Sequence(people)) = map.get_mut("content") {
                        for person in people.iter_mut() {
                            if let Value::Mapping(person) = person {
                                person.insert(Value::from("kind"), Value::from("person"));
                            }
                        }
                    }
                }
                for (key, value) in map.iter_mut() {
                    let name = key.as_str();
                    if name.is_some_and(|k| k == "label" || k == "kind")
                        || (name.is_some() && name == ctx.image_key)
                    {
                        continue;
                    }
                    *value = self.build_object(std::mem::take(value), ctx)?;
                }
            }
        }

        if let Some(image_key) = ctx.image_key {
            if let Some(image) = map.get_mut(image_key) {
                let patched = resolve_patches(std::mem::take(image), &self.loader)?;
                *image = match patched.as_str() {
                    Some(src) => match self.relocator.relocate(src, &ctx.assets)? {
                        Some(url) => Value::String(url),
                        None => patched,
                    },
                    None => patched,
                };
            }
        }
        Ok(Value::Mapping(map))
    }

    fn build_chapters(&mut self, map: &mut Mapping, ctx: &BuildContext) -> Result<()> {
        let Some(content) = map.get_mut("content") else {
            return Ok(());
        };
        let chapters = match std::mem::take(content) {
            Value::Sequence(chapters) => chapters,
            other => {
                return Err(BuildError::malformed(
                    "chapters content must be a list",
                    &other,
                ))
            }
        };

        let mut built = Vec::with_capacity(chapters.len());
        for chapter in chapters {
            let chapter = match sole_index_reference(&chapter) {
                Some(path) => self.compile(IndexSource::File(path), CompileOptions::default())?,
                None => self.compile_body(chapter, IndexKind::Index, &ctx.with_image_key(None))?,
            };
            built.push(chapter);
        }
        *content = Value::Sequence(built);
        Ok(())
    }

    /// Resolve one link descriptor.
    pub(crate) fn build_link(
        &mut self,
        node: Value,
        ctx: &BuildContext,
        register: bool,
    ) -> Result<Value> {
        let node = resolve_patches(node, &self.loader)?;
        let mut link = match node {
            Value::Mapping(link) => link,
            other => return Err(BuildError::malformed("link must be a mapping", &other)),
        };
        for (_, value) in link.iter_mut() {
            *value = resolve_patches(std::mem::take(value), &self.loader)?;
        }

        let kind = LinkKind::classify(&link)?;

        if !matches!(
            kind,
            LinkKind::SubIndex(_) | LinkKind::People | LinkKind::Chapters
        ) {
            if let Some(Value::String(description)) = link.get("description") {
                let html = self.render_markdown(description, &ctx.assets)?;
                link.insert(Value::from("description"), Value::String(html));
            }
        }

        let mut link = match &kind {
            LinkKind::Notebook(target) => {
                self.build_content_unit(link, target, ContentKind::Notebook, register)?
            }
            LinkKind::Markdown(target) => {
                self.build_content_unit(link, target, ContentKind::Markdown, register)?
            }
            LinkKind::SubIndex(target) => self.build_index_link(link, target)?,
            LinkKind::Pdf(target) => {
                let assets = AssetContext::new(None, self.config.assets_dir.clone());
                let url = self
                    .relocator
                    .relocate(target, &assets)?
                    .unwrap_or_else(|| target.clone());
                link.insert(Value::from("pdf"), Value::String(url.clone()));
                link.insert(Value::from("link"), Value::String(url));
                if !link.contains_key("kind") {
                    link.insert(Value::from("kind"), Value::from("PDF"));
                }
                link
            }
            LinkKind::Person => self.build_person(link, ctx)?,
            LinkKind::People | LinkKind::Chapters => {
                return self.build_object(Value::Mapping(link), ctx);
            }
            LinkKind::Plain(_) => link,
        };

        if !kind.is_person() {
            self.relocate_link_image(&mut link, ctx)?;
        }

        let target = link
            .get("link")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if !link.contains_key("kind") && target.ends_with(".pdf") {
            link.insert(Value::from("kind"), Value::from("PDF"));
        }
        if register && !kind.is_person() && !target.starts_with('#') {
            self.register_link(&link);
        }
        Ok(Value::Mapping(link))
    }

    fn build_index_link(&mut self, mut link: Mapping, target: &str) -> Result<Mapping> {
        let index = self.compile(IndexSource::File(target.to_string()), CompileOptions::default())?;
        if !link.contains_key("text") {
            let title = header_value(&index, "title").or_else(|| index.get("title").cloned());
            if let Some(title) = title {
                link.insert(Value::from("text"), title);
            }
        }
        if !link.contains_key("description") {
            if let Some(description) = header_value(&index, "description") {
                link.insert(Value::from("description"), description);
            }
        }
        let slug = self.document_slug(&with_yaml_extension(target));
        link.insert(Value::from("link"), Value::String(slug));
        link.insert(Value::from("kind"), Value::from("Page"));
        Ok(link)
    }

    fn relocate_link_image(&mut self, link: &mut Mapping, ctx: &BuildContext) -> Result<()> {
        let Some(image) = link.get_mut("image") else {
            return Ok(());
        };
        match image {
            Value::String(src) => {
                if let Some(url) = self.relocator.relocate(src, &ctx.assets)? {
                    *src = url;
                }
            }
            Value::Mapping(figure) => {
                if !matches!(figure.get("src"), Some(Value::String(_))) {
                    return Err(BuildError::malformed(
                        "no source was specified for link image",
                        &Value::Mapping(figure.clone()),
                    ));
                }
                if let Some(Value::String(src)) = figure.get_mut("src") {
                    if let Some(url) = self.relocator.relocate(src, &ctx.assets)? {
                        *src = url;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn build_person(&mut self, mut person: Mapping, ctx: &BuildContext) -> Result<Mapping> {
        let name = person.get("name").and_then(Value::as_str).map(str::to_string);
        let Some(name) = name else {
            return Err(BuildError::malformed(
                "person must have a name",
                &Value::Mapping(person),
            ));
        };
        if let Some(slug) = &ctx.search_slug {
            self.search.add_content(slug, &name);
        }

        let mut github_image = None;
        match person.get_mut("contact") {
            Some(Value::Sequence(contacts)) => {
                let contact_ctx = ctx.without_search();
                for contact in contacts.iter_mut() {
                    let built = self.build_link(std::mem::take(contact), &contact_ctx, false)?;
                    if github_image.is_none() {
                        if let Some(url) = built.get("link").and_then(Value::as_str) {
                            if url.contains("github.com") {
                                github_image = Some(format!("{}.png", url));
                            }
                        }
                    }
                    *contact = built;
                }
            }
            Some(_) => {}
            None => self.advise("person.contact", format!("no contact information for {}", name)),
        }
        if !person.contains_key("role") && !person.contains_key("roles") {
            self.advise("person.role", format!("no role specified for {}", name));
        }

        match person.get_mut("image") {
            Some(Value::String(src)) => {
                if let Some(url) = self.relocator.relocate(src, &ctx.assets)? {
                    *src = url;
                }
            }
            Some(_) => {}
            None => {
                if let Some(image) = github_image {
                    person.insert(Value::from("image"), Value::String(image));
                }
            }
        }

        if let Some(Value::String(bio)) = person.get("bio") {
            let html = self.render_markdown(bio, &ctx.assets)?;
            person.insert(Value::from("bio"), Value::String(html));
        }
        Ok(person)
    }

    /// Register a built link as a search entry.
    pub(crate) fn register_link(&mut self, link: &Mapping) {
        let Some(target) = link.get("link").and_then(Value::as_str) else {
            return;
        };
        let kind = link.get("kind").and_then(Value::as_str);
        let title = link
            .get("text")
            .and_then(Value::as_str)
            .or(kind)
            .unwrap_or("External link");
        let description = link.get("description").and_then(Value::as_str);
        self.search.add_item(
            target,
            target,
            title,
            description,
            Some(kind.unwrap_or("External")),
        );
    }

    fn render_template(&mut self, map: Mapping, ctx: &BuildContext) -> Result<Value> {
        let name = match map.get("template") {
            Some(Value::String(name)) => name.clone(),
            other => {
                return Err(BuildError::malformed(
                    "template name must be a string",
                    other.unwrap_or(&Value::Null),
                ))
            }
        };
        let context: Mapping = map
            .into_iter()
            .filter(|(key, _)| key.as_str() != Some("template"))
            .collect();
        debug!(template = %name, "rendering template");
        let html = self.templates.render(&name, &context)?;
        let html = self.rewrite_html(&html, &ctx.assets, ctx.search_links)?;
        if let Some(slug) = &ctx.search_slug {
            self.search.add_content(slug, &html_to_text(&html));
        }
        Ok(Value::String(html))
    }

    /// Markdown to HTML with local assets relocated.
    pub(crate) fn render_markdown(&mut self, text: &str, assets: &AssetContext) -> Result<String> {
        let html = self.markdown.render(text);
        self.rewrite_html(&html, assets, false)
    }

    pub(crate) fn advise(&mut self, code: &str, message: String) {
        warn!(code, "{}", message);
        let source = self.stack.last().cloned();
        self.diagnostics.push(Diagnostic::warning(code, message, source));
    }

    pub(crate) fn source_root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn output_dir(&self) -> &Path {
        &self.output
    }

    pub(crate) fn baseurl(&self) -> &str {
        &self.baseurl
    }

    pub(crate) fn record_artifact(&mut self, path: PathBuf) {
        self.artifacts.push(path);
    }
}

/// Kind of a content unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContentKind {
    Notebook,
    Markdown,
}

impl ContentKind {
    pub fn name(self) -> &'static str {
        match self {
            ContentKind::Notebook => "notebook",
            ContentKind::Markdown => "md",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ContentKind::Notebook => "ipynb",
            ContentKind::Markdown => "md",
        }
    }
}

fn header_value(document: &Value, key: &str) -> Option<Value> {
    document.get("header").and_then(|h| h.get(key)).cloned()
}

fn header_field(document: &Value, key: &str) -> Option<String> {
    header_value(document, key).and_then(|v| v.as_str().map(str::to_string))
}

/// Path of a chapter written as exactly `{index: path}`.
fn sole_index_reference(chapter: &Value) -> Option<String> {
    let map = chapter.as_mapping()?;
    if map.len() != 1 {
        return None;
    }
    map.get("index").and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct Site {
        dir: tempfile::TempDir,
    }

    impl Site {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn file(&self, path: &str, contents: &str) -> &Self {
            let full = self.dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, contents).unwrap();
            self
        }

        fn session(&self) -> Session {
            self.session_with(|_| {})
        }

        fn session_with(&self, tweak: impl FnOnce(&mut Config)) -> Session {
            let mut config = Config::default().with_root(self.dir.path());
            config.output = PathBuf::from("out");
            tweak(&mut config);
            Session::new(config)
        }

        fn read(&self, path: &str) -> String {
            fs::read_to_string(self.dir.path().join("out").join(path)).unwrap()
        }

        fn data(&self, name: &str) -> Value {
            serde_yaml::from_str(&self.read(&format!("_data/{}.yml", name))).unwrap()
        }

        fn exists(&self, path: &str) -> bool {
            self.dir.path().join("out").join(path).exists()
        }
    }

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    fn ctx() -> BuildContext {
        BuildContext {
            image_key: None,
            assets: AssetContext::new(None, "assets"),
            search_slug: Some("/page".into()),
            search_links: true,
        }
    }

    #[test]
    fn test_root_document_emits_data_and_home_page() {
        let site = Site::new();
        site.file("index.yml", "header: {title: Course}\nintro: Welcome *all*\n");
        let mut session = site.session();
        let report = session.build_site().unwrap();

        let data = site.data("index");
        assert_eq!(data["title"], yaml("Course"));
        assert!(data["intro"].as_str().unwrap().contains("<em>all</em>"));
        assert_eq!(data["search"], yaml("{content: true, links: false}"));
        assert!(site.read("index.html").contains("index: index"));
        assert!(site.exists("_data/search.yml"));
        assert_eq!(report.documents, 1);

        let entry = session.search().get("/").unwrap();
        assert_eq!(entry.title, "Course");
        assert!(entry.content.contains("Welcome all"));
    }

    #[test]
    fn test_root_alias_maps_source_to_target() {
        let site = Site::new();
        site.file("home.yml", "title: Home\n");
        let mut session = site.session_with(|c| c.index = "home.yml".into());
        session.build_site().unwrap();
        assert!(site.exists("_data/index.yml"));
        assert!(site.exists("index.html"));
        assert_eq!(session.document_slug("home.yml"), "/");
        assert_eq!(session.document_slug("other.yml"), "/other.html");
    }

    #[test]
    fn test_missing_index_names_kind() {
        let site = Site::new();
        let mut session = site.session();
        let err = session
            .compile(
                IndexSource::File("nope".into()),
                CompileOptions::default().with_kind(IndexKind::Content),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "Content file nope.yml could not be found");
    }

    #[test]
    fn test_non_mapping_document_rejected() {
        let site = Site::new();
        site.file("index.yml", "- a\n- b\n");
        let err = site.session().build_site().unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_compile_twice_is_idempotent() {
        let site = Site::new();
        site.file("sub.yml", "title: Sub\n");
        let mut session = site.session();
        let first = session
            .compile(IndexSource::File("sub".into()), CompileOptions::default())
            .unwrap();
        let second = session
            .compile(IndexSource::File("sub.yml".into()), CompileOptions::default())
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(session.artifacts().len(), 2);
        assert_eq!(session.search().len(), 1);
    }

    #[test]
    fn test_people_and_person_links() {
        let site = Site::new();
        let mut session = site.session();
        let node = yaml(
            "kind: people\n\
             content:\n\
             - name: Ada\n  role: Author\n  contact:\n  - link: https://github.com/ada\n    text: GitHub\n\
             - name: Bob\n  bio: '**bold**'\n",
        );
        let built = session.build_object(node, &ctx()).unwrap();
        let people = built["content"].as_sequence().unwrap();
        assert_eq!(people[0]["kind"], yaml("person"));
        assert_eq!(people[0]["image"], yaml("https://github.com/ada.png"));
        assert!(people[1]["bio"].as_str().unwrap().contains("<strong>bold</strong>"));
        // contacts never register search entries
        assert!(!session.search().contains("https://github.com/ada"));
        let codes: Vec<_> = session.diagnostics().iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["person.contact", "person.role"]);
        assert_eq!(session.search().get("/page").unwrap().content, "Ada Bob");
    }

    #[test]
    fn test_person_without_name_fails() {
        let site = Site::new();
        let mut session = site.session();
        let err = session
            .build_link(yaml("kind: person\nrole: x"), &ctx(), true)
            .unwrap_err();
        assert!(err.to_string().contains("person must have a name"));
    }

    #[test]
    fn test_plain_link_registration() {
        let site = Site::new();
        let mut session = site.session();
        let built = session
            .build_link(
                yaml("link: https://example.com/paper.pdf\ntext: Paper\ndescription: A *paper*"),
                &ctx(),
                true,
            )
            .unwrap();
        assert_eq!(built["kind"], yaml("PDF"));
        let entry = session.search().get("https://example.com/paper.pdf").unwrap();
        assert_eq!(entry.title, "Paper");
        assert_eq!(entry.category, "PDF");
        assert!(entry.description.contains("<em>paper</em>"));

        session
            .build_link(yaml("link: '#section'"), &ctx(), true)
            .unwrap();
        assert!(!session.search().contains("#section"));
        session
            .build_link(yaml("link: https://x.org"), &ctx(), false)
            .unwrap();
        assert!(!session.search().contains("https://x.org"));
    }

    #[test]
    fn test_pdf_link_relocated() {
        let site = Site::new();
        site.file("docs/notes.pdf", "%PDF");
        let mut session = site.session_with(|c| c.baseurl = "course".into());
        let built = session
            .build_link(yaml("pdf: docs/notes.pdf\ntext: Notes"), &ctx(), true)
            .unwrap();
        assert_eq!(built["link"], yaml("/course/assets/docs/notes.pdf"));
        assert_eq!(built["kind"], yaml("PDF"));
        assert!(site.exists("assets/docs/notes.pdf"));
    }

    #[test]
    fn test_pdf_with_link_key_rejected() {
        let site = Site::new();
        site.file("a.pdf", "%PDF");
        let mut session = site.session();
        let err = session
            .build_link(yaml("pdf: a.pdf\nlink: https://x.org/other"), &ctx(), true)
            .unwrap_err();
        assert!(err.is_structural());
        assert!(!site.exists("assets/a.pdf"));
        assert!(session.search().is_empty());
    }

    #[test]
    fn test_link_image_mapping_requires_src() {
        let site = Site::new();
        let mut session = site.session();
        let err = session
            .build_link(yaml("link: https://x.org\nimage: {alt: x}"), &ctx(), true)
            .unwrap_err();
        assert!(err.to_string().contains("no source was specified"));
    }

    #[test]
    fn test_background_image_relocated() {
        let site = Site::new();
        site.file("img/bg.png", "png");
        site.file(
            "index.yml",
            "section:\n  background: img/bg.png\n  content: Hello\n",
        );
        site.session().build_site().unwrap();
        let data = site.data("index");
        assert_eq!(data["section"]["background"], yaml("/assets/img/bg.png"));
        assert!(site.exists("assets/img/bg.png"));
    }

    #[test]
    fn test_search_links_flag_from_config() {
        let site = Site::new();
        site.file(
            "index.yml",
            "config: {search: {content: false, links: true}}\nlinks:\n- link: https://a.org\n  text: A\n",
        );
        let mut session = site.session();
        session.build_site().unwrap();
        assert!(session.search().contains("https://a.org"));
        assert_eq!(session.search().get("/").unwrap().content, "");
    }

    #[test]
    fn test_inline_chapters_inherit_search() {
        let site = Site::new();
        site.file(
            "index.yml",
            "chapters:\n  kind: chapters\n  content:\n  - title: One\n    text: Inline chapter body\n",
        );
        let mut session = site.session();
        session.build_site().unwrap();
        let data = site.data("index");
        let chapter = &data["chapters"]["content"][0];
        assert_eq!(chapter["title"], yaml("One"));
        assert!(session
            .search()
            .get("/")
            .unwrap()
            .content
            .contains("Inline chapter body"));
    }

    #[test]
    fn test_subs_applied_to_body() {
        let site = Site::new();
        site.file(
            "index.yml",
            "sub: {label: Section}\ntitle: T\nfirst: Some text\nsecond: {label: Own, content: More}\n",
        );
        site.session().build_site().unwrap();
        let data = site.data("index");
        assert_eq!(data["first"]["label"], yaml("Section"));
        assert!(data["first"]["content"].as_str().unwrap().contains("Some text"));
        assert_eq!(data["second"]["label"], yaml("Own"));
        assert_eq!(data["title"], yaml("T"));
    }

    #[test]
    fn test_unknown_markdown_extension_is_advisory() {
        let site = Site::new();
        let session = site.session_with(|c| c.markdown_extensions = vec!["toc".into()]);
        assert_eq!(session.diagnostics().len(), 1);
        assert_eq!(session.diagnostics()[0].code, "markdown.extension");
    }
}
