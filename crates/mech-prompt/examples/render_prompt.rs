//! Render a bundled prompt as chat messages
//!
//! Uses `PROMPTS_DIR` when set, otherwise the `prompts/` directory of this crate.
//!
//! ```bash
//! cargo run -p mech-prompt --example render_prompt
//! RUST_LOG=debug PROMPTS_DIR=/srv/prompts cargo run -p mech-prompt --example render_prompt
//! ```

use mech_prompt::PromptManager;
use mech_utils::{Config, init_tracing};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut config = Config::from_env()?;
    if config.prompts.prompts_dir.is_none() {
        config.prompts.prompts_dir = Some(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts").into());
    }

    let manager = PromptManager::from_config(&config.prompts)?;

    println!("Available prompts:");
    for id in manager.list_prompts(None)? {
        let metadata = manager.get_metadata(id.as_str())?;
        println!("  {id:<24} {}", metadata.description);
    }

    let context = json!({
        "intent": "L-shaped bracket holding a NEMA 17 motor on 20x20 extrusion",
        "constraints": ["max mass 0.1 kg", "min wall 3 mm", "M3 fasteners only"],
        "process": "CNC milling",
        "shared_with_other_prompts": true,
    });

    let prompt = manager.render("lme.clarify.v1", &context)?;
    println!(
        "\nmodel: {} (thinking disabled: {})",
        config.llm.model,
        config.llm.disables_thinking()
    );
    for (role, text) in prompt.into_messages() {
        println!("\n[{role}]\n{text}");
    }

    Ok(())
}
