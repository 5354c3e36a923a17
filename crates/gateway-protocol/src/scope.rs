//! Scope-shape satisfaction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A required-scope shape attached to a procedure. Combines `allOf`,
/// `anyOf` groups and `not` exclusions; a principal satisfies the shape iff
/// every rule passes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeRequirement {
    #[serde(default, rename = "allOf", skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<String>,
    #[serde(default, rename = "anyOf", skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Vec<String>>,
    #[serde(default, rename = "not", skip_serializing_if = "Vec::is_empty")]
    pub not: Vec<String>,
}

impl ScopeRequirement {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all_of(scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            all_of: scopes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A principal satisfies this shape iff all `allOf` scopes are present,
    /// at least one of each `anyOf` group is present, and none of `not` are
    /// present.
    pub fn satisfied_by(&self, granted: &BTreeSet<String>) -> bool {
        let all_of_ok = self.all_of.iter().all(|s| granted.contains(s));
        let any_of_ok = self
            .any_of
            .iter()
            .all(|group| group.iter().any(|s| granted.contains(s)));
        let not_ok = self.not.iter().all(|s| !granted.contains(s));
        all_of_ok && any_of_ok && not_ok
    }

    pub fn is_empty(&self) -> bool {
        self.all_of.is_empty() && self.any_of.is_empty() && self.not.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(scopes: &[&str]) -> BTreeSet<String> {
        scopes.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_requirement_always_satisfied() {
        assert!(ScopeRequirement::none().satisfied_by(&set(&[])));
    }

    #[test]
    fn all_of_requires_every_scope() {
        let req = ScopeRequirement::all_of(["ai:generate", "mcp:tools"]);
        assert!(!req.satisfied_by(&set(&["ai:generate"])));
        assert!(req.satisfied_by(&set(&["ai:generate", "mcp:tools"])));
    }

    #[test]
    fn any_of_requires_one_per_group() {
        let req = ScopeRequirement {
            any_of: vec![vec!["a".into(), "b".into()]],
            ..Default::default()
        };
        assert!(req.satisfied_by(&set(&["b"])));
        assert!(!req.satisfied_by(&set(&["c"])));
    }

    #[test]
    fn not_excludes_revoked_scopes() {
        let req = ScopeRequirement {
            not: vec!["banned".into()],
            ..Default::default()
        };
        assert!(!req.satisfied_by(&set(&["banned"])));
        assert!(req.satisfied_by(&set(&["ok"])));
    }
}
