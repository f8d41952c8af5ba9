//! Prompt builder: renders templates and enforces the character budget.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptInputs};
use handlebars::Handlebars;
use ragchat_core::{AppError, AppResult};
use serde_json::json;

const SYSTEM_TEMPLATE: &str = "system";
const USER_TEMPLATE: &str = "user";

/// Build a prompt from a definition and inputs.
///
/// Every retrieved context document and the question are always rendered.
/// When the result exceeds `max_chars`, history turns are dropped oldest
/// first until it fits or no history is left; a prompt that is still too
/// large is returned with `over_budget` set and left for the model service
/// to reject.
///
/// # Example
/// ```no_run
/// use ragchat_prompt::{build_prompt, builtin_prompt, PromptInputs, ANSWER_PROMPT_ID};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt(ANSWER_PROMPT_ID).expect("built-in");
/// let inputs = PromptInputs {
///     question: "What is the code for Hotel?".to_string(),
///     ..Default::default()
/// };
/// let built = build_prompt(&def, &inputs, 12_000)?;
/// println!("{}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    inputs: &PromptInputs,
    max_chars: usize,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let registry = register_templates(definition)?;
    let total_turns = inputs.history.len();
    let mut dropped = 0;

    loop {
        let (system, user) = render(&registry, definition, inputs, dropped)?;
        let char_count =
            user.chars().count() + system.as_deref().map_or(0, |s| s.chars().count());

        if char_count <= max_chars || dropped == total_turns {
            let over_budget = char_count > max_chars;
            if dropped > 0 {
                tracing::info!(
                    "Dropped {} of {} history turns to fit prompt budget of {} chars",
                    dropped,
                    total_turns,
                    max_chars
                );
            }
            if over_budget {
                tracing::warn!(
                    "Prompt '{}' is {} chars, over the {} char budget with no history left",
                    definition.id,
                    char_count,
                    max_chars
                );
            }

            return Ok(BuiltPrompt {
                system,
                user,
                metadata: BuiltPromptMetadata {
                    source_prompt_id: definition.id.clone(),
                    context_documents: inputs.context.len(),
                    history_turns_included: total_turns - dropped,
                    history_turns_dropped: dropped,
                    char_count,
                    over_budget,
                },
            });
        }

        dropped += 1;
    }
}

fn register_templates(definition: &PromptDefinition) -> AppResult<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();

    // Plain text prompts, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string(USER_TEMPLATE, &definition.template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    if let Some(system) = &definition.system {
        handlebars
            .register_template_string(SYSTEM_TEMPLATE, system)
            .map_err(|e| AppError::Prompt(format!("Failed to register system template: {}", e)))?;
    }

    Ok(handlebars)
}

fn render(
    registry: &Handlebars<'_>,
    definition: &PromptDefinition,
    inputs: &PromptInputs,
    skip_turns: usize,
) -> AppResult<(Option<String>, String)> {
    let context: Vec<_> = inputs
        .context
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            json!({
                "index": i + 1,
                "source": doc.source,
                "text": doc.text,
            })
        })
        .collect();

    let data = json!({
        "question": inputs.question,
        "context": context,
        "history": &inputs.history[skip_turns..],
    });

    let user = registry
        .render(USER_TEMPLATE, &data)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    let system = if definition.system.is_some() {
        Some(
            registry
                .render(SYSTEM_TEMPLATE, &data)
                .map_err(|e| AppError::Prompt(format!("Failed to render system template: {}", e)))?,
        )
    } else {
        None
    };

    Ok((system, user))
}
