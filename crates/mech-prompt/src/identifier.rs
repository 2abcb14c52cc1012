//! Dotted template identifiers
//!
//! A [`TemplateId`] names one template file under the prompt root. The mapping
//! is fixed: every segment but the last two becomes a directory, and the file
//! name is `<name>.<version>.jinja`.
//!
//! ```text
//! lme.clarify.v1        -> lme/clarify.v1.jinja
//! dfm.review.cost.v2    -> dfm/review/cost.v2.jinja
//! ```

use crate::{PromptError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Extension every template file carries
pub const TEMPLATE_EXTENSION: &str = "jinja";

const MIN_SEGMENTS: usize = 3;

/// A validated `<namespace>.<name>.<version>` identifier
///
/// Construction is the only place validation happens, so a `TemplateId` can
/// always be joined to the root without leaving it.
///
/// # Examples
///
/// ```
/// use mech_prompt::TemplateId;
///
/// let id: TemplateId = "lme.clarify.v1".parse().unwrap();
/// assert_eq!(id.namespace(), "lme");
/// assert_eq!(id.name(), "clarify");
/// assert_eq!(id.version(), "v1");
/// assert_eq!(id.relative_path(), std::path::PathBuf::from("lme/clarify.v1.jinja"));
///
/// assert!("../../etc.passwd".parse::<TemplateId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TemplateId {
    raw: String,
}

impl TemplateId {
    /// Validate and wrap an identifier string
    pub fn new(identifier: impl Into<String>) -> Result<Self> {
        let raw = identifier.into();
        validate(&raw)?;
        Ok(Self { raw })
    }

    /// The identifier as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// First segment
    pub fn namespace(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    /// Second-to-last segment
    pub fn name(&self) -> &str {
        self.segments().rev().nth(1).unwrap_or_default()
    }

    /// Last segment, e.g. `v1`
    pub fn version(&self) -> &str {
        self.segments().next_back().unwrap_or_default()
    }

    /// Path of the template file relative to the prompt root
    pub fn relative_path(&self) -> PathBuf {
        let segments: Vec<&str> = self.segments().collect();
        let (dirs, file_parts) = segments.split_at(segments.len() - 2);
        let mut path: PathBuf = dirs.iter().collect();
        path.push(format!(
            "{}.{}.{}",
            file_parts[0], file_parts[1], TEMPLATE_EXTENSION
        ));
        path
    }

    /// Reverse of [`relative_path`](Self::relative_path)
    ///
    /// Returns `None` for paths that no valid identifier maps to.
    pub fn from_relative_path(path: &Path) -> Option<Self> {
        let mut dirs = Vec::new();
        let mut components = path.components().peekable();
        let mut file_name = None;
        while let Some(component) = components.next() {
            let Component::Normal(part) = component else {
                return None;
            };
            let part = part.to_str()?;
            if components.peek().is_some() {
                dirs.push(part);
            } else {
                file_name = Some(part);
            }
        }

        let stem = file_name?.strip_suffix(&format!(".{TEMPLATE_EXTENSION}"))?;
        let mut raw = dirs.join(".");
        if !raw.is_empty() {
            raw.push('.');
        }
        raw.push_str(stem);

        let id = Self::new(raw).ok()?;
        (id.relative_path() == path).then_some(id)
    }

    fn segments(&self) -> std::str::Split<'_, char> {
        self.raw.split('.')
    }
}

fn validate(raw: &str) -> Result<()> {
    if raw.is_empty() {
        return Err(PromptError::invalid_identifier(raw, "identifier is empty"));
    }

    // Traversal is checked on the raw string so that no later rewrite can
    // turn it into a path component.
    if raw.contains("..") || raw.contains('/') || raw.contains('\\') {
        return Err(PromptError::invalid_identifier(
            raw,
            "identifier must not contain path traversal or separators",
        ));
    }

    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() < MIN_SEGMENTS {
        return Err(PromptError::invalid_identifier(
            raw,
            "expected '<namespace>.<name>.<version>'",
        ));
    }

    for segment in &segments {
        if segment.is_empty() {
            return Err(PromptError::invalid_identifier(raw, "empty segment"));
        }
        if let Some(bad) = segment
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(PromptError::invalid_identifier(
                raw,
                format!("disallowed character {bad:?} in segment '{segment}'"),
            ));
        }
    }

    let version = segments[segments.len() - 1];
    let is_version = version
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
    if !is_version {
        return Err(PromptError::invalid_identifier(
            raw,
            format!("version segment '{version}' must look like 'v1'"),
        ));
    }

    Ok(())
}

impl FromStr for TemplateId {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for TemplateId {
    type Error = PromptError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TemplateId {
    type Error = PromptError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TemplateId> for String {
    fn from(id: TemplateId) -> Self {
        id.raw
    }
}

impl AsRef<str> for TemplateId {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
