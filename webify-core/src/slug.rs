//! Path and slug normalization.
//!
//! Documents and content files are addressed by `/`-separated paths relative
//! to the source root. These helpers turn such paths into data artifact names,
//! baseurl-prefixed site URLs and search slugs.

use std::path::{Component, Path};

/// Endings stripped from document paths before they become slugs.
pub const DOCUMENT_ENDINGS: &[&str] = &[".yml", ".yaml", ".html", ".md"];

/// Strip each of `endings` from the end of `input`, in order, at most once.
///
/// ```
/// use webify_core::slug::remove_ending;
///
/// assert_eq!(remove_ending("intro/index.yml", &[".yml", ".yaml"]), "intro/index");
/// assert_eq!(remove_ending("page.html", &["index.html"]), "page.html");
/// ```
pub fn remove_ending(input: &str, endings: &[&str]) -> String {
    let mut result = input.to_string();
    for ending in endings {
        if let Some(stripped) = result.strip_suffix(ending) {
            result = stripped.to_string();
        }
    }
    result
}

/// Append `.yml` unless the path already names a YAML file.
pub fn with_yaml_extension(path: &str) -> String {
    if path.ends_with(".yml") || path.ends_with(".yaml") {
        path.to_string()
    } else {
        format!("{}.yml", path)
    }
}

/// Name of the data artifact generated for a document path.
///
/// Path components are joined with `_`; YAML/HTML extensions and spaces are
/// removed.
///
/// ```
/// use webify_core::slug::data_name;
///
/// assert_eq!(data_name("chapters/intro/index.yml"), "chapters_intro_index");
/// assert_eq!(data_name("my notes/metadata.yml"), "mynotes_metadata");
/// ```
pub fn data_name(path: &str) -> String {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("_")
        .replace(".html", "")
        .replace(".yml", "")
        .replace(".yaml", "")
        .replace(' ', "")
}

/// Prefix `url` with `/<baseurl>/`.
///
/// Without a baseurl the url is left relative. With `handle_html` the result
/// is forced to end in `.html`, and when a baseurl is active a trailing
/// `index.html` collapses to its parent directory.
///
/// ```
/// use webify_core::slug::prepend_baseurl;
///
/// assert_eq!(prepend_baseurl("index", Some(""), true), "/");
/// assert_eq!(prepend_baseurl("intro/index", Some("course"), true), "/course/intro/");
/// assert_eq!(prepend_baseurl("assets/a.png", Some("course"), false), "/course/assets/a.png");
/// assert_eq!(prepend_baseurl("about", None, true), "about.html");
/// ```
pub fn prepend_baseurl(url: &str, baseurl: Option<&str>, handle_html: bool) -> String {
    let mut result = match baseurl {
        Some(base) => {
            let prefix = format!("/{}", base);
            let url = url.trim_start_matches('/');
            if prefix.ends_with('/') {
                format!("{}{}", prefix, url)
            } else {
                format!("{}/{}", prefix, url)
            }
        }
        None => url.to_string(),
    };

    if handle_html {
        if !result.ends_with(".html") {
            result.push_str(".html");
        }
        if baseurl.is_some() {
            result = remove_ending(&result, &["index.html"]);
        }
    }
    result
}

/// Trim whitespace and surrounding slashes from a configured baseurl.
pub fn normalize_baseurl(raw: &str) -> String {
    raw.trim().trim_matches('/').to_string()
}

/// Lexically normalize a relative `/`-separated path.
///
/// `.` segments are dropped and `..` pops the previous segment; a `..` that
/// would climb above the root is discarded.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    parts.join("/")
}

/// Join two `/`-separated relative paths.
pub fn join_path(dir: &str, path: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", dir, path)
    }
}

/// Parent directory of a `/`-separated path (empty for top-level files).
pub fn parent_dir(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_ending_applies_each_once() {
        assert_eq!(remove_ending("a.md.html", DOCUMENT_ENDINGS), "a");
        assert_eq!(remove_ending("a.yml.yml", &[".yml"]), "a.yml");
        assert_eq!(remove_ending("plain", DOCUMENT_ENDINGS), "plain");
    }

    #[test]
    fn test_with_yaml_extension() {
        assert_eq!(with_yaml_extension("index"), "index.yml");
        assert_eq!(with_yaml_extension("index.yml"), "index.yml");
        assert_eq!(with_yaml_extension("people.yaml"), "people.yaml");
    }

    #[test]
    fn test_data_name() {
        assert_eq!(data_name("index.yml"), "index");
        assert_eq!(data_name("./a/b/metadata.yaml"), "a_b_metadata");
        assert_eq!(data_name("pages/about.html"), "pages_about");
    }

    #[test]
    fn test_prepend_baseurl_collapses_index() {
        assert_eq!(prepend_baseurl("index", Some(""), true), "/");
        assert_eq!(prepend_baseurl("a/index", Some(""), true), "/a/");
        assert_eq!(prepend_baseurl("a/page.html", Some(""), true), "/a/page.html");
        assert_eq!(prepend_baseurl("a", Some("repo/"), true), "/repo/a.html");
    }

    #[test]
    fn test_prepend_baseurl_without_base_keeps_index() {
        assert_eq!(prepend_baseurl("index", None, true), "index.html");
        assert_eq!(prepend_baseurl("assets/x.pdf", None, false), "assets/x.pdf");
    }

    #[test]
    fn test_normalize_baseurl() {
        assert_eq!(normalize_baseurl("/repo/"), "repo");
        assert_eq!(normalize_baseurl(""), "");
        assert_eq!(normalize_baseurl(" docs "), "docs");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./a/b/../c.yml"), "a/c.yml");
        assert_eq!(normalize_path("../../x"), "x");
        assert_eq!(normalize_path("a//b"), "a/b");
    }

    #[test]
    fn test_join_and_parent() {
        assert_eq!(join_path("", "x.md"), "x.md");
        assert_eq!(join_path("a/", "x.md"), "a/x.md");
        assert_eq!(parent_dir("a/b/x.md"), "a/b");
        assert_eq!(parent_dir("x.md"), "");
    }
}
