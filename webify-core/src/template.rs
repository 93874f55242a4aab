//! Runtime templates for the `template` directive.

use crate::error::{BuildError, Result};
use minijinja::{path_loader, AutoEscape, Environment, ErrorKind};
use serde_yaml::Mapping;
use std::path::PathBuf;

/// Jinja-style templates loaded on demand from a directory.
#[derive(Debug)]
pub struct TemplateEngine {
    dir: PathBuf,
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let mut env = Environment::new();
        env.set_loader(path_loader(&dir));
        // fragments are embedded verbatim in the data artifacts
        env.set_auto_escape_callback(|_| AutoEscape::None);
        Self { dir, env }
    }

    /// Render template `name` with the fields of `context`.
    pub fn render(&self, name: &str, context: &Mapping) -> Result<String> {
        let template = self.env.get_template(name).map_err(|e| {
            if e.kind() == ErrorKind::TemplateNotFound {
                BuildError::missing("Template", self.dir.join(name))
            } else {
                BuildError::structural(format!("template `{}` is invalid: {}", name, e))
            }
        })?;
        template
            .render(context)
            .map_err(|e| BuildError::structural(format!("template `{}` failed to render: {}", name, e)))
    }
}
