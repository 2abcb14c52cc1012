//! MiniJinja-backed body rendering
//!
//! Bodies use standard Jinja2 syntax:
//! - Variables: `{{ variable }}`
//! - Filters: `{{ name | upper }}`, `{{ parts | bullets }}`
//! - Conditionals: `{% if condition %}...{% endif %}`
//! - Loops: `{% for item in items %}...{% endfor %}`
//!
//! Undefined variables are errors, never empty strings. The environment has
//! no global functions or values, so every top-level name a body reads must
//! come from the render context.

use minijinja::value::Value;
use minijinja::{Environment, UndefinedBehavior};
use std::collections::BTreeSet;

/// Shared Jinja environment for all templates of one manager
pub(crate) struct PromptRenderer {
    env: Environment<'static>,
}

impl PromptRenderer {
    pub(crate) fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);

        // `range`, `namespace` and friends would otherwise stand in for missing context keys
        let globals: Vec<String> = env.globals().map(|(name, _)| name.to_string()).collect();
        for name in &globals {
            env.remove_global(name);
        }

        // One "- item" line per element
        env.add_filter("bullets", |items: Vec<Value>| {
            items
                .iter()
                .map(|item| format!("- {item}"))
                .collect::<Vec<_>>()
                .join("\n")
        });

        Self { env }
    }

    /// Compile `source` and collect the top-level variables it reads
    pub(crate) fn referenced_variables(
        &self,
        source: &str,
    ) -> std::result::Result<BTreeSet<String>, minijinja::Error> {
        let template = self.env.template_from_str(source)?;
        Ok(template.undeclared_variables(false).into_iter().collect())
    }

    pub(crate) fn render(
        &self,
        source: &str,
        vars: &serde_json::Value,
    ) -> std::result::Result<String, minijinja::Error> {
        let value = Value::from_serialize(vars);
        self.env.render_str(source, value)
    }
}

impl std::fmt::Debug for PromptRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRenderer")
            .field("undefined", &"strict")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_simple_template() {
        let renderer = PromptRenderer::new();
        let result = renderer
            .render("Hello, {{ name }}!", &json!({ "name": "World" }))
            .unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_referenced_variables() {
        let renderer = PromptRenderer::new();
        let vars = renderer
            .referenced_variables("{{ b }} {{ a | upper }} {{ part.name }} {{ a }}")
            .unwrap();
        assert_eq!(names(&vars), vec!["a", "b", "part"]);
    }

    #[test]
    fn test_loop_variables_are_not_referenced() {
        let renderer = PromptRenderer::new();
        let vars = renderer
            .referenced_variables("{% for item in items %}{{ item }}{{ loop.index }}{% endfor %}")
            .unwrap();
        assert_eq!(names(&vars), vec!["items"]);

        let vars = renderer
            .referenced_variables("{% set total = 3 %}{{ total }}")
            .unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn test_builtin_names_are_context_variables() {
        let renderer = PromptRenderer::new();
        let vars = renderer
            .referenced_variables("{{ namespace }} {{ range }} {{ dict }} {{ debug }}")
            .unwrap();
        assert_eq!(names(&vars), vec!["debug", "dict", "namespace", "range"]);

        assert!(renderer.render("{{ namespace }}", &json!({})).is_err());
        assert_eq!(
            renderer
                .render("{{ namespace }}", &json!({ "namespace": "lme" }))
                .unwrap(),
            "lme"
        );
    }

    #[test]
    fn test_invalid_template_error() {
        let renderer = PromptRenderer::new();
        assert!(renderer.referenced_variables("{{ unclosed").is_err());
        assert!(renderer.referenced_variables("{% if x %}no end").is_err());
    }

    #[test]
    fn test_strict_undefined() {
        let renderer = PromptRenderer::new();
        assert!(renderer.render("{{ missing }}", &json!({})).is_err());
    }

    #[test]
    fn test_non_string_values() {
        let renderer = PromptRenderer::new();
        let result = renderer
            .render(
                "{{ count }} {{ ratio }} {{ ok }}",
                &json!({ "count": 4, "ratio": 0.25, "ok": true }),
            )
            .unwrap();
        assert_eq!(result, "4 0.25 true");
    }

    #[test]
    fn test_bullets_filter() {
        let renderer = PromptRenderer::new();
        let result = renderer
            .render(
                "{{ items | bullets }}",
                &json!({ "items": ["M3 bolt", "PLA", 2] }),
            )
            .unwrap();
        assert_eq!(result, "- M3 bolt\n- PLA\n- 2");
    }

    #[test]
    fn test_conditional() {
        let renderer = PromptRenderer::new();
        let source = "{% if detailed %}Detailed analysis{% else %}Brief analysis{% endif %}";
        assert_eq!(
            renderer.render(source, &json!({ "detailed": true })).unwrap(),
            "Detailed analysis"
        );
        assert_eq!(
            renderer.render(source, &json!({ "detailed": false })).unwrap(),
            "Brief analysis"
        );
    }

    #[test]
    fn test_trim_blocks() {
        let renderer = PromptRenderer::new();
        let result = renderer
            .render(
                "{% for item in items %}\n  - {{ item }}\n{% endfor %}\n",
                &json!({ "items": ["one", "two"] }),
            )
            .unwrap();
        assert_eq!(result, "  - one\n  - two\n");
    }
}
