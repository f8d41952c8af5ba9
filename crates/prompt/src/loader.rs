//! Prompt loader: workspace YAML overrides on top of built-in definitions.

use crate::types::PromptDefinition;
use ragchat_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Prompt used to answer a question from retrieved chunks.
pub const ANSWER_PROMPT_ID: &str = "rag.answer.default";

/// Prompt used to rewrite a follow-up into a standalone question.
pub const CONDENSE_PROMPT_ID: &str = "rag.condense.default";

const ANSWER_SYSTEM: &str = "You are a helpful assistant answering questions about the user's documents.\n\
Use the pieces of context provided with each question to answer it.\n\
If the context does not contain the answer, say that you don't know instead of making one up.\n\
Keep the answer short and quote codes and figures exactly as they appear in the context.";

const ANSWER_TEMPLATE: &str = "{{#if context}}Context:\n\
{{#each context}}[{{this.index}}] ({{this.source}})\n{{this.text}}\n\n{{/each}}\
{{else}}No document context was retrieved for this question.\n\n{{/if}}\
{{#if history}}Conversation so far:\n\
{{#each history}}Human: {{this.question}}\nAssistant: {{this.answer}}\n{{/each}}\n{{/if}}\
Question: {{question}}\n\
Helpful answer:";

const CONDENSE_TEMPLATE: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.\n\n\
Chat History:\n\
{{#each history}}Human: {{this.question}}\nAssistant: {{this.answer}}\n{{/each}}\
Follow Up Input: {{question}}\n\
Standalone question:";

/// Get a built-in prompt definition by ID.
pub fn builtin_prompt(prompt_id: &str) -> Option<PromptDefinition> {
    match prompt_id {
        ANSWER_PROMPT_ID => Some(PromptDefinition {
            id: ANSWER_PROMPT_ID.to_string(),
            title: "Answer from retrieved context".to_string(),
            api_version: "1.0".to_string(),
            system: Some(ANSWER_SYSTEM.to_string()),
            template: ANSWER_TEMPLATE.to_string(),
        }),
        CONDENSE_PROMPT_ID => Some(PromptDefinition {
            id: CONDENSE_PROMPT_ID.to_string(),
            title: "Condense follow-up question".to_string(),
            api_version: "1.0".to_string(),
            system: None,
            template: CONDENSE_TEMPLATE.to_string(),
        }),
        _ => None,
    }
}

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path
        .join(ragchat_core::config::STATE_DIR)
        .join("prompts")
}

/// Load a prompt definition by ID.
///
/// Looks for `.ragchat/prompts/<id>.yaml` (or `.yml`) in the workspace and
/// falls back to the built-in definition with the same ID.
///
/// # Example
/// ```no_run
/// use ragchat_prompt::{load_prompt, ANSWER_PROMPT_ID};
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), ANSWER_PROMPT_ID)?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let dir = prompts_dir(workspace_path);
    let candidates = [
        dir.join(format!("{}.yaml", prompt_id)),
        dir.join(format!("{}.yml", prompt_id)),
    ];

    if let Some(prompt_file) = candidates.iter().find(|p| p.exists()) {
        tracing::debug!("Loading prompt from: {:?}", prompt_file);

        let contents = std::fs::read_to_string(prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;

        let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to parse prompt YAML {:?}: {}",
                prompt_file, e
            ))
        })?;

        validate_prompt(&definition)?;
        tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);
        return Ok(definition);
    }

    builtin_prompt(prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))
}

/// List prompt IDs overridden in the workspace.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let dir = prompts_dir(workspace_path);

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids = Vec::new();

    for entry in walkdir::WalkDir::new(&dir).max_depth(1) {
        let entry = entry
            .map_err(|e| AppError::Prompt(format!("Failed to list prompts in {:?}: {}", dir, e)))?;
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        );
        if path.is_file() && is_yaml {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                prompt_ids.push(stem.to_string());
            }
        }
    }

    prompt_ids.sort();
    Ok(prompt_ids)
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if !def.template.contains("{{question}}") {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' never renders {{{{question}}}}",
            def.id
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, content: &str) {
        let prompts_dir = prompts_dir(dir);
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(format!("{}.yaml", id)), content).unwrap();
    }

    #[test]
    fn test_builtin_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_prompt(temp_dir.path(), ANSWER_PROMPT_ID).unwrap();
        assert_eq!(prompt.id, ANSWER_PROMPT_ID);
        assert!(prompt.system.is_some());
    }

    #[test]
    fn test_workspace_override() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            ANSWER_PROMPT_ID,
            "id: rag.answer.default\ntitle: Japanese\napiVersion: \"1.0\"\nsystem: 日本語で回答してください。\ntemplate: \"質問: {{question}}\"\n",
        );

        let prompt = load_prompt(temp_dir.path(), ANSWER_PROMPT_ID).unwrap();
        assert_eq!(prompt.title, "Japanese");
        assert_eq!(prompt.template, "質問: {{question}}");
    }

    #[test]
    fn test_override_must_render_question() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "rag.answer.default",
            "id: rag.answer.default\ntitle: Bad\napiVersion: \"1.0\"\ntemplate: \"no placeholder\"\n",
        );

        assert!(load_prompt(temp_dir.path(), ANSWER_PROMPT_ID).is_err());
    }

    #[test]
    fn test_unknown_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "invalid", "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), "invalid").is_err());
    }

    #[test]
    fn test_list_prompts() {
        let temp_dir = TempDir::new().unwrap();
        let body = "id: p\ntitle: P\napiVersion: \"1.0\"\ntemplate: \"{{question}}\"\n";
        write_prompt(temp_dir.path(), "prompt2", body);
        write_prompt(temp_dir.path(), "prompt1", body);

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(prompts, vec!["prompt1".to_string(), "prompt2".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_list_prompts_unreadable_dir_is_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let body = "id: p\ntitle: P\napiVersion: \"1.0\"\ntemplate: \"{{question}}\"\n";
        write_prompt(temp_dir.path(), "prompt1", body);

        let dir = prompts_dir(temp_dir.path());
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still list the directory
        let readable = std::fs::read_dir(&dir).is_ok();
        let result = list_prompts(temp_dir.path());

        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        if readable {
            assert_eq!(result.unwrap(), vec!["prompt1".to_string()]);
        } else {
            assert!(matches!(result, Err(AppError::Prompt(_))));
        }
    }
}
