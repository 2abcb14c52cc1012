//! Template file model
//!
//! A template file is optional YAML front matter followed by a body:
//!
//! ```text
//! ---
//! prompt_id: lme.clarify.v1
//! required: [intent, constraints]
//! ---
//! [SYSTEM]
//! You are a mechanical design assistant.
//! [USER]
//! Clarify this intent: {{ intent }}
//! ```
//!
//! A body without `[SYSTEM]`/`[USER]` marker lines is a single prompt.

use crate::{PromptError, Result, TemplateId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

const FRONT_MATTER_DELIMITER: &str = "---";
const SYSTEM_MARKER: &str = "[SYSTEM]";
const USER_MARKER: &str = "[USER]";

/// Metadata declared in a template's front matter
///
/// Every field is optional; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptMetadata {
    /// Identifier the file claims to be, checked against the requested one
    pub prompt_id: Option<String>,
    /// Content version of the prompt, e.g. `1.0.0`
    pub version: Option<String>,
    /// Human-readable description
    pub description: String,
    /// Prompt owner
    pub author: Option<String>,
    /// Name of the schema the model output is expected to match
    pub output_schema: Option<String>,
    /// Categorization tags
    pub tags: Vec<String>,
    /// Variables the author declares as required
    pub required: Option<Vec<String>>,
}

/// Role of a prompt section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl Role {
    /// Role name as chat APIs spell it
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrendered template body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateBody {
    /// No section markers
    Single(String),
    /// Split by `[SYSTEM]` and `[USER]` marker lines
    Sections { system: String, user: String },
}

impl TemplateBody {
    /// Each part of the body with its role (`None` for an undivided body)
    pub fn parts(&self) -> Vec<(Option<Role>, &str)> {
        match self {
            TemplateBody::Single(text) => vec![(None, text.as_str())],
            TemplateBody::Sections { system, user } => vec![
                (Some(Role::System), system.as_str()),
                (Some(Role::User), user.as_str()),
            ],
        }
    }

    /// Whether the body carries section markers
    pub fn is_sectioned(&self) -> bool {
        matches!(self, TemplateBody::Sections { .. })
    }
}

/// A loaded, syntax-checked template
#[derive(Debug, Clone)]
pub struct ParsedTemplate {
    pub(crate) id: TemplateId,
    pub(crate) path: PathBuf,
    pub(crate) metadata: PromptMetadata,
    pub(crate) body: TemplateBody,
    pub(crate) referenced: BTreeSet<String>,
}

impl ParsedTemplate {
    pub fn id(&self) -> &TemplateId {
        &self.id
    }

    /// File the template was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &PromptMetadata {
        &self.metadata
    }

    pub fn body(&self) -> &TemplateBody {
        &self.body
    }

    /// Top-level variables the body refers to, across all sections
    pub fn referenced_variables(&self) -> &BTreeSet<String> {
        &self.referenced
    }

    /// Declared variables that the body actually uses, or every referenced
    /// variable when the front matter declares none
    pub fn required_variables(&self) -> BTreeSet<String> {
        match &self.metadata.required {
            Some(declared) => declared
                .iter()
                .filter(|name| self.referenced.contains(*name))
                .cloned()
                .collect(),
            None => self.referenced.clone(),
        }
    }

    /// Declared variables the body never references
    pub fn unused_declarations(&self) -> Vec<&str> {
        self.metadata
            .required
            .iter()
            .flatten()
            .filter(|name| !self.referenced.contains(*name))
            .map(String::as_str)
            .collect()
    }
}

/// Output of a render
///
/// The variant is chosen by the template, not by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RenderedPrompt {
    Single(String),
    Sections { system: String, user: String },
}

impl RenderedPrompt {
    /// The rendered text of an undivided template
    pub fn as_single(&self) -> Option<&str> {
        match self {
            RenderedPrompt::Single(text) => Some(text),
            RenderedPrompt::Sections { .. } => None,
        }
    }

    /// The rendered system section
    pub fn system(&self) -> Option<&str> {
        match self {
            RenderedPrompt::Sections { system, .. } => Some(system),
            RenderedPrompt::Single(_) => None,
        }
    }

    /// The rendered user section
    pub fn user(&self) -> Option<&str> {
        match self {
            RenderedPrompt::Sections { user, .. } => Some(user),
            RenderedPrompt::Single(_) => None,
        }
    }

    /// Chat messages in order; an undivided prompt becomes one user message
    pub fn into_messages(self) -> Vec<(Role, String)> {
        match self {
            RenderedPrompt::Single(text) => vec![(Role::User, text)],
            RenderedPrompt::Sections { system, user } => {
                vec![(Role::System, system), (Role::User, user)]
            }
        }
    }
}

/// Split a template file into metadata and body
pub(crate) fn parse_source(path: &Path, source: &str) -> Result<(PromptMetadata, TemplateBody)> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let (metadata, body) = split_front_matter(path, source)?;
    Ok((metadata, split_sections(path, body)?))
}

fn split_front_matter<'a>(path: &Path, source: &'a str) -> Result<(PromptMetadata, &'a str)> {
    let mut lines = source.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Ok((PromptMetadata::default(), source));
    };
    if first.trim_end() != FRONT_MATTER_DELIMITER {
        return Ok((PromptMetadata::default(), source));
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == FRONT_MATTER_DELIMITER {
            let yaml = &source[yaml_start..offset];
            let metadata = parse_metadata(path, yaml)?;
            return Ok((metadata, &source[offset + line.len()..]));
        }
        offset += line.len();
    }

    Err(PromptError::parse(
        path,
        "front matter opened with '---' but never closed",
    ))
}

fn parse_metadata(path: &Path, yaml: &str) -> Result<PromptMetadata> {
    if yaml.trim().is_empty() {
        return Ok(PromptMetadata::default());
    }
    serde_yaml::from_str(yaml)
        .map_err(|e| PromptError::parse(path, format!("invalid front matter: {e}")))
}

/// The break ending a part's last line belongs to the file layout, not the text
fn strip_line_break(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

fn split_sections(path: &Path, body: &str) -> Result<TemplateBody> {
    // (role, marker line start, marker line end)
    let mut markers: Vec<(Role, usize, usize)> = Vec::new();
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let role = match line.trim() {
            SYSTEM_MARKER => Some(Role::System),
            USER_MARKER => Some(Role::User),
            _ => None,
        };
        if let Some(role) = role {
            markers.push((role, offset, offset + line.len()));
        }
        offset += line.len();
    }

    match markers.as_slice() {
        [] => Ok(TemplateBody::Single(strip_line_break(body).to_string())),
        [(Role::System, sys_start, sys_end), (Role::User, user_start, user_end)] => {
            if !body[..*sys_start].trim().is_empty() {
                return Err(PromptError::parse(
                    path,
                    format!("text before {SYSTEM_MARKER} belongs to no section"),
                ));
            }
            Ok(TemplateBody::Sections {
                system: strip_line_break(&body[*sys_end..*user_start]).to_string(),
                user: strip_line_break(&body[*user_end..]).to_string(),
            })
        }
        found => {
            let seen: Vec<&str> = found
                .iter()
                .map(|(role, _, _)| match role {
                    Role::System => SYSTEM_MARKER,
                    Role::User => USER_MARKER,
                })
                .collect();
            Err(PromptError::parse(
                path,
                format!(
                    "unbalanced section markers: expected {SYSTEM_MARKER} then {USER_MARKER}, found [{}]",
                    seen.join(", ")
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<(PromptMetadata, TemplateBody)> {
        parse_source(Path::new("test.v1.jinja"), source)
    }

    fn assert_parse_error(source: &str, needle: &str) {
        match parse(source) {
            Err(PromptError::TemplateParseError { detail, .. }) => {
                assert!(detail.contains(needle), "{detail:?} lacks {needle:?}");
            }
            other => panic!("expected TemplateParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_body() {
        let (metadata, body) = parse("Hello, {{ name }}!").unwrap();
        assert_eq!(metadata, PromptMetadata::default());
        assert_eq!(body, TemplateBody::Single("Hello, {{ name }}!".to_string()));
        assert!(!body.is_sectioned());
    }

    #[test]
    fn test_front_matter() {
        let source = "---\nprompt_id: lme.clarify.v1\nversion: 1.0.0\ntags: [lme, clarify]\nrequired: [intent]\nextra_key: ignored\n---\nClarify {{ intent }}\n";
        let (metadata, body) = parse(source).unwrap();
        assert_eq!(metadata.prompt_id.as_deref(), Some("lme.clarify.v1"));
        assert_eq!(metadata.version.as_deref(), Some("1.0.0"));
        assert_eq!(metadata.tags, vec!["lme", "clarify"]);
        assert_eq!(metadata.required, Some(vec!["intent".to_string()]));
        assert_eq!(body, TemplateBody::Single("Clarify {{ intent }}\n".to_string()));
    }

    #[test]
    fn test_empty_front_matter() {
        let (metadata, body) = parse("---\n---\nBody").unwrap();
        assert_eq!(metadata, PromptMetadata::default());
        assert_eq!(body, TemplateBody::Single("Body".to_string()));
    }

    #[test]
    fn test_crlf_front_matter() {
        let (metadata, _) = parse("---\r\ndescription: windows\r\n---\r\nBody").unwrap();
        assert_eq!(metadata.description, "windows");
    }

    #[test]
    fn test_unclosed_front_matter() {
        assert_parse_error("---\nrequired: [a]\nBody {{ a }}", "never closed");
    }

    #[test]
    fn test_invalid_yaml() {
        assert_parse_error("---\nrequired: [a, b\n---\nBody", "invalid front matter");
        assert_parse_error("---\nrequired: 42\n---\nBody", "invalid front matter");
    }

    #[test]
    fn test_sections() {
        let source = "---\nrequired: [a, b]\n---\n[SYSTEM]\nSystem {{ a }}\n[USER]\nUser {{ b }}\n";
        let (_, body) = parse(source).unwrap();
        assert_eq!(
            body,
            TemplateBody::Sections {
                system: "System {{ a }}".to_string(),
                user: "User {{ b }}".to_string(),
            }
        );
        let roles: Vec<_> = body.parts().into_iter().map(|(role, _)| role).collect();
        assert_eq!(roles, vec![Some(Role::System), Some(Role::User)]);
    }

    #[test]
    fn test_only_the_final_line_break_is_dropped() {
        let (_, body) = parse("    indented\nline two\n\n").unwrap();
        assert_eq!(body, TemplateBody::Single("    indented\nline two\n".to_string()));

        let (_, body) = parse("[SYSTEM]\r\n  sys\r\n[USER]\r\nusr\r\n").unwrap();
        assert_eq!(
            body,
            TemplateBody::Sections {
                system: "  sys".to_string(),
                user: "usr".to_string(),
            }
        );
    }

    #[test]
    fn test_marker_with_surrounding_whitespace() {
        let (_, body) = parse("\n  [SYSTEM]  \nsys\n\t[USER]\nusr").unwrap();
        assert!(body.is_sectioned());
    }

    #[test]
    fn test_marker_inside_line_is_text() {
        let (_, body) = parse("Reply with [SYSTEM] literally").unwrap();
        assert!(!body.is_sectioned());
    }

    #[test]
    fn test_unbalanced_markers() {
        assert_parse_error("[SYSTEM]\nonly system", "unbalanced");
        assert_parse_error("[USER]\nonly user", "unbalanced");
        assert_parse_error("[USER]\nu\n[SYSTEM]\ns", "unbalanced");
        assert_parse_error("[SYSTEM]\na\n[SYSTEM]\nb\n[USER]\nc", "unbalanced");
        assert_parse_error("preamble\n[SYSTEM]\ns\n[USER]\nu", "no section");
    }

    #[test]
    fn test_rendered_accessors() {
        let single = RenderedPrompt::Single("hi".to_string());
        assert_eq!(single.as_single(), Some("hi"));
        assert_eq!(single.system(), None);
        assert_eq!(single.into_messages(), vec![(Role::User, "hi".to_string())]);

        let split = RenderedPrompt::Sections {
            system: "s".to_string(),
            user: "u".to_string(),
        };
        assert_eq!(split.system(), Some("s"));
        assert_eq!(split.user(), Some("u"));
        assert_eq!(split.as_single(), None);
        assert_eq!(
            split.into_messages(),
            vec![(Role::System, "s".to_string()), (Role::User, "u".to_string())]
        );
    }

    #[test]
    fn test_rendered_serializes_flat() {
        let split = RenderedPrompt::Sections {
            system: "s".to_string(),
            user: "u".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&split).unwrap(),
            serde_json::json!({ "system": "s", "user": "u" })
        );
        assert_eq!(
            serde_json::to_value(RenderedPrompt::Single("x".to_string())).unwrap(),
            serde_json::json!("x")
        );
    }

    #[test]
    fn test_required_variables() {
        let mut template = ParsedTemplate {
            id: TemplateId::new("a.b.v1").unwrap(),
            path: PathBuf::from("a/b.v1.jinja"),
            metadata: PromptMetadata {
                required: Some(vec!["a".to_string(), "unused".to_string()]),
                ..PromptMetadata::default()
            },
            body: TemplateBody::Single(String::new()),
            referenced: ["a", "b"].into_iter().map(String::from).collect(),
        };
        let required: Vec<_> = template.required_variables().into_iter().collect();
        assert_eq!(required, vec!["a"]);
        assert_eq!(template.unused_declarations(), vec!["unused"]);

        template.metadata.required = None;
        let required: Vec<_> = template.required_variables().into_iter().collect();
        assert_eq!(required, vec!["a", "b"]);
        assert!(template.unused_declarations().is_empty());
    }
}
