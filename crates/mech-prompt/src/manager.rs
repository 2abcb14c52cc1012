//! Prompt manager
//!
//! [`PromptManager`] is the entry point agents use: it owns the template root,
//! the Jinja environment and the read-through cache, and exposes `resolve`,
//! `load` and `render`.

use crate::cache::TemplateCache;
use crate::jinja::PromptRenderer;
use crate::loader::TemplateLoader;
use crate::template::Role;
use crate::{
    ParsedTemplate, PromptError, PromptMetadata, RenderedPrompt, Result, TemplateBody, TemplateId,
};
use mech_utils::PromptConfig;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, instrument};

/// Loads and renders versioned prompt templates from one root directory
///
/// # Examples
///
/// ```no_run
/// use mech_prompt::PromptManager;
/// use serde_json::json;
///
/// # fn main() -> mech_prompt::Result<()> {
/// let manager = PromptManager::new("./prompts")?;
/// let prompt = manager.render("lme.clarify.v1", &json!({ "intent": "bracket" }))?;
/// for (role, text) in prompt.into_messages() {
///     println!("{role}: {text}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PromptManager {
    loader: TemplateLoader,
    renderer: PromptRenderer,
    cache: TemplateCache,
    use_cache: bool,
}

impl PromptManager {
    /// Create a manager rooted at `root`
    ///
    /// Fails with [`PromptError::RootNotFound`] if `root` is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let loader = TemplateLoader::new(root)?;
        info!(root = %loader.base_path().display(), "prompt manager ready");
        Ok(Self {
            loader,
            renderer: PromptRenderer::new(),
            cache: TemplateCache::new(),
            use_cache: true,
        })
    }

    /// Create a manager from explicit configuration
    pub fn from_config(config: &PromptConfig) -> Result<Self> {
        let root = config.require_dir()?;
        Ok(Self::new(root)?.with_cache(config.cache))
    }

    /// Create a manager from `PROMPTS_DIR` and friends
    pub fn from_env() -> Result<Self> {
        Self::from_config(&PromptConfig::from_env()?)
    }

    /// Enable or disable the read cache
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Template root directory (canonicalized)
    pub fn root(&self) -> &Path {
        self.loader.base_path()
    }

    /// Map an identifier to its template file
    ///
    /// The identifier is validated before the filesystem is touched.
    pub fn resolve(&self, identifier: &str) -> Result<PathBuf> {
        let id = TemplateId::new(identifier)?;
        self.loader.resolve(&id)
    }

    /// Read and parse the template at `path`, bypassing the cache
    ///
    /// `path` is normally the result of [`resolve`](Self::resolve).
    pub fn load(&self, path: &Path) -> Result<ParsedTemplate> {
        self.loader.load(path, &self.renderer)
    }

    /// Resolve and load a template, going through the cache when enabled
    #[instrument(skip(self), level = "debug")]
    pub fn load_template(&self, identifier: &str) -> Result<Arc<ParsedTemplate>> {
        let id = TemplateId::new(identifier)?;
        let path = self.loader.resolve(&id)?;

        if !self.use_cache {
            return Ok(Arc::new(self.load(&path)?));
        }

        let modified = modified_time(&path);
        if let Some(hit) = self.cache.get(&id, modified) {
            debug!(identifier = %id, "template cache hit");
            return Ok(hit);
        }

        debug!(identifier = %id, "template cache miss");
        let template = Arc::new(self.load(&path)?);
        info!(identifier = %id, path = %path.display(), "loaded prompt template");
        self.cache.insert(Arc::clone(&template), modified);
        Ok(template)
    }

    /// Render a template with `context`
    ///
    /// `context` must be a JSON object (or `null` for no variables). Every
    /// placeholder the template references must have an entry; missing ones
    /// are reported together. Extra entries are ignored.
    pub fn render(&self, identifier: &str, context: &serde_json::Value) -> Result<RenderedPrompt> {
        let template = self.load_template(identifier)?;
        self.render_template(&template, context)
    }

    /// Render an already loaded template
    pub fn render_template(
        &self,
        template: &ParsedTemplate,
        context: &serde_json::Value,
    ) -> Result<RenderedPrompt> {
        let provided = context_keys(context)?;

        let missing: Vec<String> = template
            .referenced_variables()
            .iter()
            .filter(|name| !provided.contains(name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PromptError::MissingVariable {
                identifier: template.id().to_string(),
                missing,
            });
        }

        let render_part = |role: Option<Role>, source: &str| -> Result<String> {
            self.renderer
                .render(source, context)
                .map_err(|e| PromptError::RenderError {
                    identifier: template.id().to_string(),
                    detail: match role {
                        Some(role) => format!("{role} section: {e}"),
                        None => e.to_string(),
                    },
                })
        };

        match template.body() {
            TemplateBody::Single(text) => Ok(RenderedPrompt::Single(render_part(None, text)?)),
            TemplateBody::Sections { system, user } => Ok(RenderedPrompt::Sections {
                system: render_part(Some(Role::System), system)?,
                user: render_part(Some(Role::User), user)?,
            }),
        }
    }

    /// Front matter of a template
    pub fn get_metadata(&self, identifier: &str) -> Result<PromptMetadata> {
        Ok(self.load_template(identifier)?.metadata().clone())
    }

    /// Variables a caller must supply, per the template's declaration
    pub fn required_variables(&self, identifier: &str) -> Result<BTreeSet<String>> {
        Ok(self.load_template(identifier)?.required_variables())
    }

    /// Every template under the root, optionally limited to one namespace
    pub fn list_prompts(&self, namespace: Option<&str>) -> Result<Vec<TemplateId>> {
        self.loader.list_templates(namespace)
    }

    /// Drop all cached templates
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached templates
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn context_keys(context: &serde_json::Value) -> Result<BTreeSet<&str>> {
    match context {
        serde_json::Value::Object(map) => Ok(map.keys().map(String::as_str).collect()),
        serde_json::Value::Null => Ok(BTreeSet::new()),
        other => Err(PromptError::InvalidContext(format!(
            "expected an object mapping names to values, got {}",
            json_type(other)
        ))),
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
