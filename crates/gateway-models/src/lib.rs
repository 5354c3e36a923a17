//! Provider/model catalog: alias resolution, deprecation, and restriction
//! enforcement.

mod restrictions;

pub use restrictions::{ModelRestrictions, RestrictionError};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

const EMBEDDED_MODELS_JSON: &str = include_str!("models.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_token: f64,
    pub output_per_token: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub provider: String,
    pub id: String,
    pub display_name: String,
    pub capabilities: Vec<String>,
    pub context_window: u32,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub replacement: Option<String>,
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub supports_native_tools: bool,
    #[serde(default)]
    pub supports_tool_calling: bool,
}

fn embedded_catalog() -> &'static Vec<ModelDescriptor> {
    static CATALOG: OnceLock<Vec<ModelDescriptor>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        serde_json::from_str(EMBEDDED_MODELS_JSON)
            .expect("embedded models.json must parse")
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("unknown model '{id}' for provider '{provider}'")]
    Unknown { provider: String, id: String },
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error(transparent)]
    Restriction(#[from] RestrictionError),
}

/// `(provider, model)` pairs that have already produced a deprecation
/// warning this process, so the executor logs each one exactly once
/// per `(provider, id)`.
struct WarnOnce {
    seen: Mutex<HashSet<(String, String)>>,
}

impl WarnOnce {
    fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    fn should_warn(&self, provider: &str, id: &str) -> bool {
        self.seen
            .lock()
            .insert((provider.to_string(), id.to_string()))
    }
}

struct RegistryInner {
    /// Keyed by `(provider, id)`. Populated from the embedded catalog at
    /// construction; read-only afterwards.
    by_key: HashMap<(String, String), ModelDescriptor>,
    default_model: HashMap<String, String>,
}

/// Read-only catalog plus a single-writer-then-lock-free override map for
/// restrictions: single-writer at startup and lock-free at request
/// time.
pub struct ModelRegistry {
    inner: Arc<RegistryInner>,
    overrides: ArcSwap<HashMap<String, ModelRestrictions>>,
    warned: WarnOnce,
}

impl ModelRegistry {
    /// Builds the registry from the embedded catalog plus an optional
    /// `default_model` per provider (server config `providers[].default_model`).
    pub fn new(default_models: HashMap<String, String>) -> Self {
        let mut by_key = HashMap::new();
        for descriptor in embedded_catalog() {
            by_key.insert(
                (descriptor.provider.clone(), descriptor.id.clone()),
                descriptor.clone(),
            );
        }
        Self {
            inner: Arc::new(RegistryInner {
                by_key,
                default_model: default_models,
            }),
            overrides: ArcSwap::from_pointee(HashMap::new()),
            warned: WarnOnce::new(),
        }
    }

    /// Replaces the restriction overrides wholesale. Called once at startup
    /// from server config; never called again once the server is serving
    /// requests.
    pub fn set_restrictions(&self, restrictions: HashMap<String, ModelRestrictions>) {
        self.overrides.store(Arc::new(restrictions));
    }

    fn normalize_alias<'a>(&self, provider: &str, alias: &'a str) -> Option<&'a str> {
        match alias {
            "auto" | "default" | "undefined" => self.inner.default_model.get(provider).map(|s| s.as_str()),
            other => Some(other),
        }
    }

    /// Resolves `(provider, model_alias)` to a concrete [`ModelDescriptor`],
    /// running restriction and deprecation checks.
    pub fn resolve(&self, provider: &str, model_alias: &str) -> Result<ModelDescriptor, ModelError> {
        let alias = self
            .normalize_alias(provider, model_alias)
            .ok_or_else(|| ModelError::UnknownProvider(provider.to_string()))?;

        let restrictions = self.overrides.load();
        if let Some(r) = restrictions.get(provider) {
            r.check_for_provider(provider, alias)?;
        }

        let descriptor = self
            .inner
            .by_key
            .get(&(provider.to_string(), alias.to_string()))
            .cloned()
            .ok_or_else(|| ModelError::Unknown {
                provider: provider.to_string(),
                id: alias.to_string(),
            })?;

        if descriptor.deprecated && self.warned.should_warn(provider, alias) {
            tracing::warn!(
                provider = %provider,
                model = %alias,
                replacement = ?descriptor.replacement,
                "model is deprecated"
            );
        }

        Ok(descriptor)
    }

    pub fn lookup(&self, provider: &str, id: &str) -> Option<ModelDescriptor> {
        self.inner.by_key.get(&(provider.to_string(), id.to_string())).cloned()
    }

    pub fn models_for_provider(&self, provider: &str) -> Vec<ModelDescriptor> {
        self.inner
            .by_key
            .values()
            .filter(|d| d.provider == provider)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_model() {
        let registry = ModelRegistry::new(HashMap::new());
        let descriptor = registry.resolve("anthropic", "claude-3-5-sonnet-20241022").unwrap();
        assert_eq!(descriptor.display_name, "Claude 3.5 Sonnet");
    }

    #[test]
    fn unknown_pair_is_a_typed_error_not_null() {
        let registry = ModelRegistry::new(HashMap::new());
        let err = registry.resolve("anthropic", "does-not-exist").unwrap_err();
        assert!(matches!(err, ModelError::Unknown { .. }));
    }

    #[test]
    fn auto_alias_falls_through_to_configured_default() {
        let mut defaults = HashMap::new();
        defaults.insert("anthropic".to_string(), "claude-3-5-haiku-20241022".to_string());
        let registry = ModelRegistry::new(defaults);
        let descriptor = registry.resolve("anthropic", "auto").unwrap();
        assert_eq!(descriptor.id, "claude-3-5-haiku-20241022");
    }

    #[test]
    fn deprecated_model_still_resolves() {
        let registry = ModelRegistry::new(HashMap::new());
        let descriptor = registry.resolve("anthropic", "claude-2.1").unwrap();
        assert!(descriptor.deprecated);
        assert_eq!(descriptor.replacement.as_deref(), Some("claude-3-5-sonnet-20241022"));
    }

    #[test]
    fn restrictions_block_model_before_lookup() {
        let registry = ModelRegistry::new(HashMap::new());
        let mut overrides = HashMap::new();
        overrides.insert(
            "anthropic".to_string(),
            ModelRestrictions {
                allowed_models: vec![],
                allowed_patterns: vec!["claude-3-5-*".to_string()],
                blocked_models: vec![],
            },
        );
        registry.set_restrictions(overrides);
        assert!(registry.resolve("anthropic", "claude-3-5-sonnet-20241022").is_ok());
        assert!(matches!(
            registry.resolve("anthropic", "claude-2.1"),
            Err(ModelError::Restriction(_))
        ));
    }
}
