//! Prompt resolution (spec §4.G step 1).
//!
//! `prompt_id` is looked up in the catalog; on a miss it is treated as the
//! prompt text itself. Spec §9 is explicit that this ambiguity is a
//! preserved contract, not a bug: "an implementer SHOULD log a one-shot
//! warning on fallback."

use std::collections::HashMap;
use std::sync::Mutex;

/// The global `system_prompts{}` config catalog (spec §6 configuration
/// surface). Keys may map to plain text or, in config, an object carrying
/// additional metadata — only the text is needed once loaded.
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
    prompts: HashMap<String, String>,
    warned_fallback: Mutex<HashMap<String, bool>>,
}

impl PromptCatalog {
    pub fn new(prompts: HashMap<String, String>) -> Self {
        Self {
            prompts,
            warned_fallback: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves `prompt_id` to prompt text: a catalog hit wins; a miss
    /// falls back to treating `prompt_id` as literal text, logging a
    /// one-shot warning per id.
    pub fn resolve(&self, prompt_id: &str) -> String {
        if let Some(text) = self.prompts.get(prompt_id) {
            return text.clone();
        }

        let mut warned = self.warned_fallback.lock().unwrap();
        if !warned.contains_key(prompt_id) {
            tracing::warn!(
                prompt_id,
                "prompt_id not found in catalog; falling back to treating it as literal prompt text"
            );
            warned.insert(prompt_id.to_string(), true);
        }
        prompt_id.to_string()
    }
}

/// Interpolates `{var}` placeholders against a context dictionary.
/// Placeholders with no matching key are left untouched rather than
/// erroring, so a partially-filled context degrades gracefully.
pub fn interpolate(template: &str, context: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        rest = &rest[open + 1..];
        match rest.find('}') {
            Some(close) => {
                let key = &rest[..close];
                match context.get(key) {
                    Some(value) => output.push_str(value),
                    None => {
                        output.push('{');
                        output.push_str(key);
                        output.push('}');
                    }
                }
                rest = &rest[close + 1..];
            }
            None => {
                output.push('{');
                break;
            }
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_hit_returns_stored_text() {
        let mut prompts = HashMap::new();
        prompts.insert("default".to_string(), "You are helpful.".to_string());
        let catalog = PromptCatalog::new(prompts);
        assert_eq!(catalog.resolve("default"), "You are helpful.");
    }

    #[test]
    fn catalog_miss_falls_back_to_literal() {
        let catalog = PromptCatalog::new(HashMap::new());
        assert_eq!(catalog.resolve("You are a pirate."), "You are a pirate.");
    }

    #[test]
    fn interpolates_known_placeholders() {
        let mut ctx = HashMap::new();
        ctx.insert("name".to_string(), "Ada".to_string());
        assert_eq!(interpolate("Hello {name}!", &ctx), "Hello Ada!");
    }

    #[test]
    fn leaves_unknown_placeholders_untouched() {
        let ctx = HashMap::new();
        assert_eq!(interpolate("Hello {name}!", &ctx), "Hello {name}!");
    }
}
