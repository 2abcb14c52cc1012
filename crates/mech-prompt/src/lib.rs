//! Versioned prompt templates for mech-util agents
//!
//! This crate resolves dotted template identifiers such as `lme.clarify.v1` to
//! files under a prompt root, parses their front matter and role sections, and
//! renders them with a caller-supplied context.
//!
//! # Features
//!
//! - **Fixed layout**: `lme.clarify.v1` always lives at `lme/clarify.v1.jinja`
//! - **Safe identifiers**: traversal and separators are rejected before any file is read
//! - **Role sections**: `[SYSTEM]` / `[USER]` lines split a template into chat messages
//! - **Complete checks**: every missing variable is reported at once
//! - **Read-through cache**: parsed templates are reused until the file changes
//!
//! # Quick Start
//!
//! ```
//! use mech_prompt::{PromptManager, RenderedPrompt};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::create_dir_all(dir.path().join("lme")).unwrap();
//! std::fs::write(
//!     dir.path().join("lme/clarify.v1.jinja"),
//!     "---\nrequired: [intent]\n---\n[SYSTEM]\nYou are a design reviewer.\n[USER]\nClarify: {{ intent }}\n",
//! )
//! .unwrap();
//!
//! let manager = PromptManager::new(dir.path()).unwrap();
//! let prompt = manager
//!     .render("lme.clarify.v1", &json!({ "intent": "a motor bracket" }))
//!     .unwrap();
//!
//! assert_eq!(
//!     prompt,
//!     RenderedPrompt::Sections {
//!         system: "You are a design reviewer.".to_string(),
//!         user: "Clarify: a motor bracket".to_string(),
//!     }
//! );
//! ```
//!
//! # Template Format
//!
//! ```text
//! ---
//! prompt_id: lme.clarify.v1
//! version: 1.0.0
//! required: [intent]
//! ---
//! [SYSTEM]
//! ...
//! [USER]
//! ... {{ intent }} ...
//! ```
//!
//! Front matter and section markers are both optional.

mod cache;
mod error;
mod identifier;
mod jinja;
mod loader;
mod manager;
mod template;

// Re-export core types
pub use cache::TemplateCache;
pub use error::{PromptError, Result};
pub use identifier::{TEMPLATE_EXTENSION, TemplateId};
pub use loader::TemplateLoader;
pub use manager::PromptManager;
pub use template::{ParsedTemplate, PromptMetadata, RenderedPrompt, Role, TemplateBody};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{PromptError, Result};
    pub use crate::identifier::TemplateId;
    pub use crate::manager::PromptManager;
    pub use crate::template::{RenderedPrompt, Role};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_usage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sim")).unwrap();
        std::fs::write(
            dir.path().join("sim/report.v1.jinja"),
            "Summarize {{ study }} for {{ part | upper }}.",
        )
        .unwrap();

        let manager = PromptManager::new(dir.path()).unwrap();
        let prompt = manager
            .render("sim.report.v1", &json!({ "study": "modal analysis", "part": "bracket" }))
            .unwrap();
        assert_eq!(
            prompt.as_single(),
            Some("Summarize modal analysis for BRACKET.")
        );
    }

    #[test]
    fn test_bundled_prompts_render() {
        let manager = PromptManager::new(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts")).unwrap();

        let ids: Vec<String> = manager
            .list_prompts(None)
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(ids, vec!["dfm.review.cost.v1", "lme.clarify.v1"]);

        let clarify = manager
            .render(
                "lme.clarify.v1",
                &json!({
                    "intent": "motor bracket",
                    "constraints": ["max mass 0.1 kg", "M3 only"],
                    "process": "CNC milling"
                }),
            )
            .unwrap();
        let user = clarify.user().unwrap();
        assert!(user.starts_with("Design request: motor bracket"));
        assert!(user.contains("- max mass 0.1 kg\n- M3 only"));
        assert!(user.ends_with("Preferred process: CNC milling"));

        let cost = manager
            .render(
                "dfm.review.cost.v1",
                &json!({ "component": { "name": "bracket", "material": "6061-T6", "process": "milling" } }),
            )
            .unwrap();
        assert!(cost.as_single().unwrap().starts_with("Review the manufacturing cost of bracket"));
    }

    #[test]
    fn test_prelude_exports() {
        use crate::prelude::*;

        let id: TemplateId = "lme.clarify.v1".parse().unwrap();
        assert_eq!(Role::System.as_str(), "system");
        assert!(!PromptError::InvalidContext(id.to_string()).is_retryable());
        let missing: Result<PromptManager> = PromptManager::new("/nonexistent/prompts");
        assert!(missing.is_err());
        assert_eq!(RenderedPrompt::Single(String::new()).as_single(), Some(""));
    }
}
