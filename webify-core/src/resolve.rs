//! Macro directives: `patch` splices external content into a node and `sub`
//! pushes default fields into a mapping's children.
//!
//! Both are pure transformations over `serde_yaml` values. Mapping key
//! order is significant throughout.

use crate::error::{BuildError, Result};
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;

/// Upper bound on patch expansions for a single node.
pub const MAX_PATCH_EXPANSIONS: usize = 64;

/// Fetches the external sources named by patch directives.
pub trait SourceLoader {
    /// Load `path`: YAML files are parsed, anything else is returned as a
    /// string.
    fn load(&self, path: &str) -> Result<Value>;
}

/// Loads sources from the filesystem, relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, path: &str) -> Result<Value> {
        let full = self.root.join(path);
        if !full.is_file() {
            return Err(BuildError::missing("Patch file", path));
        }
        let text = std::fs::read_to_string(&full)?;
        if is_yaml(path) {
            Ok(serde_yaml::from_str(&text)?)
        } else {
            Ok(Value::String(text))
        }
    }
}

fn is_yaml(path: &str) -> bool {
    path.ends_with(".yml") || path.ends_with(".yaml")
}

fn is_patch_key(key: &Value) -> bool {
    key.as_str().is_some_and(|k| k.starts_with("patch"))
}

/// Expand every `patch*` key of `node` until none is left.
///
/// Non-mapping nodes are returned unchanged. Patched-in content is itself
/// expanded, up to [`MAX_PATCH_EXPANSIONS`] steps.
pub fn resolve_patches(node: Value, loader: &dyn SourceLoader) -> Result<Value> {
    let mut current = node;
    let mut expansions = 0;
    loop {
        let key = match &current {
            Value::Mapping(map) => match map.keys().find(|k| is_patch_key(k)) {
                Some(key) => key.clone(),
                None => return Ok(current),
            },
            _ => return Ok(current),
        };
        if expansions == MAX_PATCH_EXPANSIONS {
            return Err(BuildError::malformed(
                "patch expansion does not terminate",
                &current,
            ));
        }
        expansions += 1;
        current = match current {
            Value::Mapping(map) => patch_with_key(&key, map, loader)?,
            other => other,
        };
    }
}

fn patch_with_key(key: &Value, owner: Mapping, loader: &dyn SourceLoader) -> Result<Value> {
    let directive = owner.get(key).cloned().unwrap_or(Value::Null);
    match directive {
        Value::String(path) => {
            let loaded = loader.load(&path)?;
            if owner.len() == 1 {
                return Ok(loaded);
            }
            splice_single(key, owner, loaded).map(Value::Mapping)
        }
        Value::Sequence(paths) => {
            let mut loaded = Vec::with_capacity(paths.len());
            for path in &paths {
                match path.as_str() {
                    Some(path) => loaded.push(loader.load(path)?),
                    None => {
                        return Err(BuildError::malformed(
                            "patch paths must be strings",
                            &Value::Mapping(owner),
                        ))
                    }
                }
            }
            splice_list(key, owner, loaded).map(Value::Mapping)
        }
        _ => Err(BuildError::malformed(
            "patch value must be a path or a list of paths",
            &Value::Mapping(owner),
        )),
    }
}

/// Single patch value next to sibling keys.
fn splice_single(key: &Value, owner: Mapping, loaded: Value) -> Result<Mapping> {
    if !loaded.is_mapping() && owner.contains_key("content") {
        return Err(BuildError::malformed(
            "cannot patch into existing content",
            &Value::Mapping(owner),
        ));
    }
    let mut patched = Mapping::with_capacity(owner.len());
    let mut loaded = Some(loaded);
    for (k, v) in owner {
        if &k != key {
            patched.insert(k, v);
            continue;
        }
        match loaded.take() {
            Some(Value::Mapping(entries)) => {
                for (pk, pv) in entries {
                    patched.insert(pk, pv);
                }
            }
            Some(other) => {
                patched.insert(Value::from("content"), other);
            }
            None => {}
        }
    }
    Ok(patched)
}

/// List-valued patch: the loaded values join the owner's `content` list.
fn splice_list(key: &Value, owner: Mapping, loaded: Vec<Value>) -> Result<Mapping> {
    let patch_first = owner
        .keys()
        .position(|k| k == key)
        .zip(owner.keys().position(|k| k.as_str() == Some("content")))
        .is_some_and(|(patch_pos, content_pos)| patch_pos < content_pos);

    let content = match owner.get("content") {
        None => loaded,
        Some(Value::Sequence(existing)) if patch_first => {
            loaded.into_iter().chain(existing.iter().cloned()).collect()
        }
        Some(Value::Sequence(existing)) => {
            existing.iter().cloned().chain(loaded).collect()
        }
        Some(_) => {
            return Err(BuildError::malformed(
                "cannot patch a list into non-list content",
                &Value::Mapping(owner),
            ))
        }
    };

    let mut patched = Mapping::with_capacity(owner.len());
    for (k, v) in owner {
        if &k != key {
            patched.insert(k, v);
        }
    }
    patched.insert(Value::from("content"), Value::Sequence(content));
    Ok(patched)
}

/// How sub defaults combine with a child's own fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubMode {
    Ignore,
    Replace,
    Mix,
}

impl SubMode {
    fn parse(value: Option<&Value>) -> Result<Self> {
        match value {
            None => Ok(SubMode::Ignore),
            Some(Value::String(mode)) => match mode.as_str() {
                "ignore" => Ok(SubMode::Ignore),
                "replace" => Ok(SubMode::Replace),
                "mix" => Ok(SubMode::Mix),
                other => Err(BuildError::structural(format!(
                    "sub apply mode `{}` is not available",
                    other
                ))),
            },
            Some(other) => Err(BuildError::malformed(
                "sub apply mode must be a string",
                other,
            )),
        }
    }
}

/// Remove `sub` and `sub-<tag>` keys from `map`, returning the directive set.
///
/// A mapping under `sub` contributes its entries; a scalar is stored under
/// the name `sub`. `sub-<tag>` keys are stored under `<tag>` and win over
/// entries of the base mapping.
fn take_subs(map: Mapping) -> (Mapping, Mapping) {
    let mut subs = Mapping::new();
    let mut rest = Mapping::with_capacity(map.len());
    let mut tagged = Vec::new();
    for (key, value) in map {
        match key.as_str() {
            Some("sub") => match value {
                Value::Mapping(entries) => {
                    for (k, v) in entries {
                        subs.insert(k, v);
                    }
                }
                other => {
                    subs.insert(Value::from("sub"), other);
                }
            },
            Some(name) if name.starts_with("sub-") => {
                let tag = &name["sub-".len()..];
                let tag = if tag.is_empty() { "sub" } else { tag };
                tagged.push((Value::from(tag), value));
            }
            _ => {
                rest.insert(key, value);
            }
        }
    }
    for (tag, value) in tagged {
        subs.insert(tag, value);
    }
    (subs, rest)
}

/// Push `sub` defaults into every child of `map` not named in `special`.
///
/// Children that are not mappings are wrapped as `{content: child}` first.
pub fn apply_subs(map: Mapping, special: &[&str]) -> Result<Mapping> {
    let (subs, mut map) = take_subs(map);
    if subs.is_empty() || (subs.len() == 1 && subs.contains_key("apply")) {
        return Ok(map);
    }
    let mode = SubMode::parse(subs.get("apply"))?;

    for (key, child) in map.iter_mut() {
        if key.as_str().is_some_and(|k| special.contains(&k)) {
            continue;
        }
        let mut fields = match std::mem::take(child) {
            Value::Mapping(fields) => fields,
            other => {
                let mut wrapped = Mapping::new();
                wrapped.insert(Value::from("content"), other);
                wrapped
            }
        };
        for (item, default) in subs.iter() {
            if item.as_str() == Some("apply") {
                continue;
            }
            match mode {
                SubMode::Replace => {
                    fields.insert(item.clone(), default.clone());
                }
                SubMode::Mix if item.as_str() == Some("label") => {
                    mix_label(&mut fields, default);
                }
                SubMode::Ignore | SubMode::Mix => {
                    if !fields.contains_key(item) {
                        fields.insert(item.clone(), default.clone());
                    }
                }
            }
        }
        *child = Value::Mapping(fields);
    }
    Ok(map)
}

fn mix_label(fields: &mut Mapping, default: &Value) {
    let merged = match (fields.get("label"), default) {
        (Some(Value::Bool(_)), _) => return,
        (existing, Value::Mapping(defaults)) => {
            let mut merged = defaults.clone();
            match existing {
                Some(Value::Mapping(own)) => {
                    for (k, v) in own {
                        merged.insert(k.clone(), v.clone());
                    }
                }
                Some(scalar) => {
                    merged.insert(Value::from("text"), scalar.clone());
                }
                None => {}
            }
            Value::Mapping(merged)
        }
        (existing, Value::String(text)) => match existing {
            Some(Value::Mapping(own)) => {
                let mut merged = Mapping::new();
                merged.insert(Value::from("text"), Value::String(text.clone()));
                for (k, v) in own {
                    merged.insert(k.clone(), v.clone());
                }
                Value::Mapping(merged)
            }
            Some(scalar) => scalar.clone(),
            None => {
                let mut merged = Mapping::new();
                merged.insert(Value::from("text"), Value::String(text.clone()));
                Value::Mapping(merged)
            }
        },
        (Some(existing), _) => existing.clone(),
        (None, other) => other.clone(),
    };
    fields.insert(Value::from("label"), merged);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapLoader(HashMap<String, Value>);

    impl MapLoader {
        fn new(entries: &[(&str, &str)]) -> Self {
            let mut files = HashMap::new();
            for (path, text) in entries {
                let value = if is_yaml(path) {
                    serde_yaml::from_str(text).unwrap()
                } else {
                    Value::String(text.to_string())
                };
                files.insert(path.to_string(), value);
            }
            MapLoader(files)
        }
    }

    impl SourceLoader for MapLoader {
        fn load(&self, path: &str) -> Result<Value> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| BuildError::missing("Patch file", path))
        }
    }

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    fn keys(value: &Value) -> Vec<String> {
        value
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_patch_merges_at_key_position() {
        let loader = MapLoader::new(&[("x.yml", "b: 2")]);
        let patched = resolve_patches(yaml("a: 1\npatch: x.yml\nc: 3"), &loader).unwrap();
        assert_eq!(keys(&patched), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_patch_overwrite_order() {
        let loader = MapLoader::new(&[("x.yml", "a: patched\nc: patched")]);
        let patched = resolve_patches(yaml("a: 1\npatch: x.yml\nc: 3"), &loader).unwrap();
        assert_eq!(patched["a"], yaml("patched"));
        assert_eq!(patched["c"], yaml("3"));
        assert_eq!(keys(&patched), vec!["a", "c"]);
    }

    #[test]
    fn test_text_patch_becomes_content() {
        let loader = MapLoader::new(&[("intro.md", "# Hello")]);
        let patched =
            resolve_patches(yaml("label: Intro\npatch: intro.md"), &loader).unwrap();
        assert_eq!(patched["content"], Value::String("# Hello".into()));
        assert_eq!(keys(&patched), vec!["label", "content"]);
    }

    #[test]
    fn test_text_patch_conflicts_with_content() {
        let loader = MapLoader::new(&[("intro.md", "# Hello")]);
        let err = resolve_patches(yaml("content: x\npatch: intro.md"), &loader).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_list_patch_concatenation_order() {
        let loader = MapLoader::new(&[("a.yml", "text: A"), ("b.yml", "text: B")]);

        let before = resolve_patches(
            yaml("patch: [a.yml, b.yml]\ncontent: [{text: C}]"),
            &loader,
        )
        .unwrap();
        let texts: Vec<_> = before["content"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|v| v["text"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["A", "B", "C"]);

        let after = resolve_patches(yaml("content: [{text: C}]\npatch: [a.yml]"), &loader).unwrap();
        let texts: Vec<_> = after["content"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|v| v["text"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["C", "A"]);
        assert!(after.get("patch").is_none());
    }

    #[test]
    fn test_list_patch_without_content() {
        let loader = MapLoader::new(&[("a.yml", "text: A")]);
        let patched = resolve_patches(yaml("patch: [a.yml]"), &loader).unwrap();
        assert_eq!(keys(&patched), vec!["content"]);
        assert_eq!(patched["content"].as_sequence().unwrap().len(), 1);
    }

    #[test]
    fn test_list_patch_into_scalar_content_fails() {
        let loader = MapLoader::new(&[("a.yml", "text: A")]);
        let err = resolve_patches(yaml("content: text\npatch: [a.yml]"), &loader).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_sole_patch_replaces_node() {
        let loader = MapLoader::new(&[("list.yml", "- a\n- b")]);
        let patched = resolve_patches(yaml("patch: list.yml"), &loader).unwrap();
        assert!(patched.is_sequence());
    }

    #[test]
    fn test_patch_fixed_point() {
        let loader = MapLoader::new(&[
            ("outer.yml", "title: Outer\npatch-inner: inner.yml"),
            ("inner.yml", "body: Inner"),
        ]);
        let patched = resolve_patches(yaml("patch: outer.yml"), &loader).unwrap();
        assert_eq!(keys(&patched), vec!["title", "body"]);
    }

    #[test]
    fn test_self_patch_does_not_terminate() {
        let loader = MapLoader::new(&[("loop.yml", "patch: loop.yml")]);
        let err = resolve_patches(yaml("patch: loop.yml"), &loader).unwrap_err();
        assert!(err.to_string().contains("does not terminate"));
    }

    #[test]
    fn test_missing_patch_file() {
        let loader = MapLoader::new(&[]);
        let err = resolve_patches(yaml("a: 1\npatch: gone.yml"), &loader).unwrap_err();
        assert!(err.is_missing_resource());
    }

    #[test]
    fn test_non_mapping_unchanged() {
        let loader = MapLoader::new(&[]);
        let node = yaml("[patch, x]");
        assert_eq!(resolve_patches(node.clone(), &loader).unwrap(), node);
    }

    #[test]
    fn test_fs_loader_reads_text_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yml"), "k: v").unwrap();
        std::fs::write(dir.path().join("b.md"), "text").unwrap();
        let loader = FsLoader::new(dir.path());
        assert_eq!(loader.load("a.yml").unwrap(), yaml("k: v"));
        assert_eq!(loader.load("b.md").unwrap(), Value::String("text".into()));
        assert!(loader.load("c.yml").unwrap_err().is_missing_resource());
    }

    #[test]
    fn test_subs_ignore_mode() {
        let map = yaml("sub: {color: red}\na: {color: blue}\nb: plain\ntitle: T");
        let result = apply_subs(map.as_mapping().unwrap().clone(), &["title"]).unwrap();
        let result = Value::Mapping(result);
        assert_eq!(result["a"]["color"], yaml("blue"));
        assert_eq!(result["b"]["color"], yaml("red"));
        assert_eq!(result["b"]["content"], yaml("plain"));
        assert_eq!(result["title"], yaml("T"));
        assert!(result.get("sub").is_none());
    }

    #[test]
    fn test_subs_replace_mode_and_tags() {
        let map = yaml("sub: {apply: replace, color: red}\nsub-size: big\na: {color: blue}");
        let result = Value::Mapping(apply_subs(map.as_mapping().unwrap().clone(), &[]).unwrap());
        assert_eq!(result["a"]["color"], yaml("red"));
        assert_eq!(result["a"]["size"], yaml("big"));
        assert_eq!(keys(&result), vec!["a"]);
    }

    #[test]
    fn test_subs_apply_only_is_noop() {
        let map = yaml("sub: {apply: mix}\na: plain");
        let result = Value::Mapping(apply_subs(map.as_mapping().unwrap().clone(), &[]).unwrap());
        assert_eq!(result["a"], yaml("plain"));
    }

    #[test]
    fn test_subs_unknown_mode() {
        let map = yaml("sub: {apply: merge, x: 1}\na: b");
        let err = apply_subs(map.as_mapping().unwrap().clone(), &[]).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_mix_label_merges_mappings() {
        let map = yaml(
            "sub: {apply: mix, label: {color: red, text: Default}}\n\
             a: {label: {text: Own}}\n\
             b: {label: Scalar}\n\
             c: {label: false}\n\
             d: {}",
        );
        let result = Value::Mapping(apply_subs(map.as_mapping().unwrap().clone(), &[]).unwrap());
        assert_eq!(result["a"]["label"], yaml("{color: red, text: Own}"));
        assert_eq!(result["b"]["label"], yaml("{color: red, text: Scalar}"));
        assert_eq!(result["c"]["label"], Value::Bool(false));
        assert_eq!(result["d"]["label"], yaml("{color: red, text: Default}"));
    }

    #[test]
    fn test_mix_label_string_default() {
        let map = yaml(
            "sub: {apply: mix, label: Default}\n\
             a: {label: {color: red}}\n\
             b: {label: Own}",
        );
        let result = Value::Mapping(apply_subs(map.as_mapping().unwrap().clone(), &[]).unwrap());
        assert_eq!(result["a"]["label"], yaml("{text: Default, color: red}"));
        assert_eq!(result["b"]["label"], yaml("Own"));
    }

    #[test]
    fn test_scalar_sub_stored_under_sub() {
        let map = yaml("sub: hello\na: {}");
        let result = Value::Mapping(apply_subs(map.as_mapping().unwrap().clone(), &[]).unwrap());
        assert_eq!(result["a"]["sub"], yaml("hello"));
    }
}
