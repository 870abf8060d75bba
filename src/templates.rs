//! HTML rendering for response shapes marked `#[schema(template = "...")]`.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path};

use minijinja::Environment;
use serde_json::Value;
use tracing::debug;

/// Renders a named template with the serialized response as its context.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, data: &Value) -> anyhow::Result<String>;
}

/// Preloaded template sources rendered with `minijinja`.
///
/// Every template is registered in each render environment, so `{% extends %}` and
/// `{% include %}` can reference any other template of the set by name.
///
/// ```
/// use ember::templates::{TemplateRenderer, TemplateSet};
/// use serde_json::json;
///
/// let set = TemplateSet::new().add("hello.html", "<h1>Hello {{ name }}!</h1>");
/// assert_eq!(set.render("hello.html", &json!({"name": "World"})).unwrap(), "<h1>Hello World!</h1>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    sources: HashMap<String, String>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(name.into(), source.into());
        self
    }

    /// Load every `.html` file under `dir`, named by its `/`-separated relative path
    /// (`partials/header.html`).
    pub fn from_dir(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        let mut set = Self::new();
        set.load_dir(dir, dir)?;
        debug!(dir = %dir.display(), templates = set.sources.len(), "Templates loaded");
        Ok(set)
    }

    fn load_dir(&mut self, root: &Path, dir: &Path) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.load_dir(root, &path)?;
            } else if path.extension().and_then(|e| e.to_str()) == Some("html") {
                if let Some(name) = template_name(root, &path) {
                    self.sources.insert(name, fs::read_to_string(&path)?);
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }
}

fn template_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();
    Some(parts?.join("/"))
}

impl TemplateRenderer for TemplateSet {
    fn render(&self, name: &str, data: &Value) -> anyhow::Result<String> {
        let mut env = Environment::new();
        for (template, source) in &self.sources {
            env.add_template(template, source)?;
        }
        let rendered = env.get_template(name)?.render(data)?;
        Ok(rendered)
    }
}
