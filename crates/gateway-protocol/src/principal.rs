//! The authenticated identity of a request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identity of the caller, resolved once per request from its bearer token
/// (or its absence) and discarded when the request ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    Anonymous,
    OAuth {
        user_id: String,
        email: Option<String>,
        scopes: BTreeSet<String>,
        /// The provider the user prefers when `metadata.provider` is absent
        /// falls back to the server default when unset.
        preferred_provider: Option<String>,
    },
    Service {
        key_id: String,
        scopes: BTreeSet<String>,
    },
}

impl Principal {
    pub fn scopes(&self) -> &BTreeSet<String> {
        static EMPTY: std::sync::OnceLock<BTreeSet<String>> = std::sync::OnceLock::new();
        match self {
            Self::Anonymous => EMPTY.get_or_init(BTreeSet::new),
            Self::OAuth { scopes, .. } | Self::Service { scopes, .. } => scopes,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::OAuth { user_id, .. } => Some(user_id),
            Self::Anonymous | Self::Service { .. } => None,
        }
    }

    pub fn preferred_provider(&self) -> Option<&str> {
        match self {
            Self::OAuth {
                preferred_provider, ..
            } => preferred_provider.as_deref(),
            _ => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_no_scopes() {
        assert!(Principal::Anonymous.scopes().is_empty());
    }

    #[test]
    fn oauth_scopes_are_a_set() {
        let p = Principal::OAuth {
            user_id: "u1".into(),
            email: None,
            scopes: ["ai:generate", "ai:generate"].into_iter().map(String::from).collect(),
            preferred_provider: None,
        };
        assert_eq!(p.scopes().len(), 1);
    }
}
