//! Allow/block-list enforcement per provider.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRestrictions {
    #[serde(default)]
    pub allowed_models: Vec<String>,
    #[serde(default)]
    pub allowed_patterns: Vec<String>,
    #[serde(default)]
    pub blocked_models: Vec<String>,
}

#[derive(Debug, Error)]
#[error("model '{model}' not allowed for provider '{provider}'")]
pub struct RestrictionError {
    pub provider: String,
    pub model: String,
    pub suggestions: Vec<String>,
}

/// Minimal glob match supporting `*` (any run of characters) and `?` (any
/// single character).
fn glob_match(pattern: &str, candidate: &str) -> bool {
    fn helper(p: &[u8], c: &[u8]) -> bool {
        match (p.first(), c.first()) {
            (None, None) => true,
            (Some(b'*'), _) => helper(&p[1..], c) || (!c.is_empty() && helper(p, &c[1..])),
            (Some(b'?'), Some(_)) => helper(&p[1..], &c[1..]),
            (Some(a), Some(b)) if a == b => helper(&p[1..], &c[1..]),
            _ => false,
        }
    }
    helper(pattern.as_bytes(), candidate.as_bytes())
}

impl ModelRestrictions {
    /// Decision table: blocked wins; else an explicit allow-list or
    /// pattern list must match if either is non-empty; else allow.
    pub fn check(&self, model: &str) -> Result<(), RestrictionError> {
        if self.blocked_models.iter().any(|m| m == model) {
            return Err(self.denied(model));
        }

        let has_allow_rules = !self.allowed_models.is_empty() || !self.allowed_patterns.is_empty();
        if !has_allow_rules {
            return Ok(());
        }

        let exact_match = self.allowed_models.iter().any(|m| m == model);
        let pattern_match = self.allowed_patterns.iter().any(|p| glob_match(p, model));
        if exact_match || pattern_match {
            Ok(())
        } else {
            Err(self.denied(model))
        }
    }

    fn denied(&self, model: &str) -> RestrictionError {
        let mut suggestions: Vec<String> = self.allowed_models.iter().cloned().collect();
        suggestions.extend(self.allowed_patterns.iter().cloned());
        suggestions.truncate(3);
        RestrictionError {
            provider: String::new(),
            model: model.to_string(),
            suggestions,
        }
    }

    /// Attaches the provider name after construction, since the restriction
    /// check itself is provider-agnostic.
    pub fn check_for_provider(&self, provider: &str, model: &str) -> Result<(), RestrictionError> {
        self.check(model).map_err(|mut e| {
            e.provider = provider.to_string();
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_always_wins() {
        let r = ModelRestrictions {
            allowed_models: vec!["claude-2.1".into()],
            allowed_patterns: vec![],
            blocked_models: vec!["claude-2.1".into()],
        };
        assert!(r.check("claude-2.1").is_err());
    }

    #[test]
    fn pattern_allows_matching_model() {
        let r = ModelRestrictions {
            allowed_models: vec![],
            allowed_patterns: vec!["claude-3-5-*".into()],
            blocked_models: vec![],
        };
        assert!(r.check("claude-3-5-sonnet-20241022").is_ok());
        assert!(r.check("claude-2.1").is_err());
    }

    #[test]
    fn empty_rules_allow_everything() {
        let r = ModelRestrictions::default();
        assert!(r.check("anything").is_ok());
    }

    #[test]
    fn denial_carries_up_to_three_suggestions() {
        let r = ModelRestrictions {
            allowed_models: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            allowed_patterns: vec![],
            blocked_models: vec![],
        };
        let err = r.check("nope").unwrap_err();
        assert_eq!(err.suggestions.len(), 3);
    }
}
