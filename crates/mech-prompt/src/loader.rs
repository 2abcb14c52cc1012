//! File-based template loader
//!
//! [`TemplateLoader`] maps identifiers to files under one root directory and
//! turns file contents into [`ParsedTemplate`]s. It never writes.
//!
//! # Directory Structure
//!
//! ```text
//! prompts/
//! ├── lme/
//! │   ├── clarify.v1.jinja      # lme.clarify.v1
//! │   └── clarify.v2.jinja      # lme.clarify.v2
//! └── dfm/
//!     └── review/
//!         └── cost.v1.jinja     # dfm.review.cost.v1
//! ```

use crate::jinja::PromptRenderer;
use crate::template::parse_source;
use crate::{ParsedTemplate, PromptError, Result, TemplateId};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Loads templates from a directory tree
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    base_path: PathBuf,
}

impl TemplateLoader {
    /// Create a loader rooted at `base_path`
    ///
    /// The root is canonicalized so resolved files can be checked against it.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        if !base_path.is_dir() {
            return Err(PromptError::RootNotFound(base_path));
        }
        let base_path = base_path.canonicalize()?;
        Ok(Self { base_path })
    }

    /// Get the base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path an identifier maps to, whether or not the file exists
    pub fn path_for(&self, id: &TemplateId) -> PathBuf {
        self.base_path.join(id.relative_path())
    }

    /// Map an identifier to its existing template file
    pub fn resolve(&self, id: &TemplateId) -> Result<PathBuf> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(PromptError::TemplateNotFound {
                identifier: id.to_string(),
                path,
            });
        }

        self.ensure_contained(id.as_str(), &path)?;
        debug!(identifier = %id, path = %path.display(), "resolved template");
        Ok(path)
    }

    /// A symlink inside the root may still point outside of it
    fn ensure_contained(&self, identifier: &str, path: &Path) -> Result<()> {
        let real = path.canonicalize()?;
        if real.starts_with(&self.base_path) {
            return Ok(());
        }
        Err(PromptError::invalid_identifier(
            identifier,
            format!("resolves outside the prompt root to '{}'", real.display()),
        ))
    }

    /// Identifier a path under the root corresponds to
    pub fn identify(&self, path: &Path) -> Result<TemplateId> {
        path.strip_prefix(&self.base_path)
            .ok()
            .and_then(TemplateId::from_relative_path)
            .ok_or_else(|| {
                PromptError::invalid_identifier(
                    &path.display().to_string(),
                    "path does not map to a template identifier under the prompt root",
                )
            })
    }

    /// Read and parse the template at `path`
    pub(crate) fn load(&self, path: &Path, renderer: &PromptRenderer) -> Result<ParsedTemplate> {
        let id = self.identify(path)?;
        self.ensure_contained(id.as_str(), path)?;
        let source = std::fs::read_to_string(path)?;
        let (metadata, body) = parse_source(path, &source)?;

        if let Some(declared) = &metadata.prompt_id {
            if declared != id.as_str() {
                return Err(PromptError::parse(
                    path,
                    format!("prompt_id mismatch: requested '{id}', but file declares '{declared}'"),
                ));
            }
        }

        let mut referenced = BTreeSet::new();
        for (role, text) in body.parts() {
            let vars = renderer.referenced_variables(text).map_err(|e| {
                let section = role.map_or("body", |r| r.as_str());
                PromptError::parse(path, format!("invalid template syntax in {section}: {e}"))
            })?;
            referenced.extend(vars);
        }

        let template = ParsedTemplate {
            id,
            path: path.to_path_buf(),
            metadata,
            body,
            referenced,
        };

        let unused = template.unused_declarations();
        if !unused.is_empty() {
            warn!(
                identifier = %template.id,
                unused = ?unused,
                "template declares required variables it never references"
            );
        }

        Ok(template)
    }

    /// Identifiers of every template under the root, sorted
    ///
    /// Files whose path does not map back to a valid identifier are skipped,
    /// as are symlinks and entries that cannot be read.
    pub fn list_templates(&self, namespace: Option<&str>) -> Result<Vec<TemplateId>> {
        let mut found = Vec::new();
        collect(std::fs::read_dir(&self.base_path)?, &mut found);

        let mut ids: Vec<TemplateId> = found
            .iter()
            .filter_map(|path| path.strip_prefix(&self.base_path).ok())
            .filter_map(TemplateId::from_relative_path)
            .filter(|id| namespace.is_none_or(|ns| id.namespace() == ns))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

fn collect(entries: std::fs::ReadDir, found: &mut Vec<PathBuf>) {
    for entry in entries.flatten() {
        // `file_type` does not follow symlinks
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            let dir = entry.path();
            match std::fs::read_dir(&dir) {
                Ok(inner) => collect(inner, found),
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable prompt directory");
                }
            }
        } else if file_type.is_file() {
            found.push(entry.path());
        }
    }
}
