//! In-memory token store (spec §5: "keyed map protected by a single
//! reader-writer lock; token issuance and revocation are writers, validation
//! is a reader"). A single process owns this map; HA is left to the durable
//! subsystems per §1's non-goals.

use crate::error::AuthError;
use crate::types::{AccessToken, AuthCode, OAuthClient};
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

const CODE_TTL_SECS: i64 = 600;
const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Default)]
struct Inner {
    clients: HashMap<String, OAuthClient>,
    codes: HashMap<String, AuthCode>,
    tokens: HashMap<String, AccessToken>,
    /// refresh token -> access token value, so rotation can find and replace
    /// the old entry in one write.
    refresh_index: HashMap<String, String>,
}

pub struct AuthStore {
    inner: RwLock<Inner>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn register_client(&self, client: OAuthClient) {
        self.inner.write().clients.insert(client.client_id.clone(), client);
    }

    pub fn get_client(&self, client_id: &str) -> Result<OAuthClient, AuthError> {
        self.inner
            .read()
            .clients
            .get(client_id)
            .cloned()
            .ok_or_else(|| AuthError::UnknownClient(client_id.to_string()))
    }

    /// Issues and persists an `AuthCode`, expiring in [`CODE_TTL_SECS`] (spec
    /// §3: `expires_at ≤ created_at + 10 min`).
    pub fn issue_code(
        &self,
        client_id: String,
        redirect_uri: String,
        scopes: BTreeSet<String>,
        code_challenge: String,
        code_challenge_method: crate::types::PkceMethod,
        user_id: String,
        email: Option<String>,
    ) -> AuthCode {
        let now = Utc::now();
        let code = AuthCode {
            code: uuid::Uuid::new_v4().to_string(),
            client_id,
            redirect_uri,
            scopes,
            code_challenge,
            code_challenge_method,
            user_id,
            email,
            created_at: now,
            expires_at: now + Duration::seconds(CODE_TTL_SECS),
            consumed: false,
        };
        self.inner.write().codes.insert(code.code.clone(), code.clone());
        code
    }

    /// Consumes a code atomically: a code can be read out successfully at
    /// most once. A second call for the same code string fails with
    /// `invalid_grant` regardless of whether it's unknown, expired, or
    /// already consumed (spec §4.C/§8: "a second exchange ... fails with
    /// invalid_grant").
    pub fn consume_code(&self, code: &str) -> Result<AuthCode, AuthError> {
        let mut guard = self.inner.write();
        let entry = guard
            .codes
            .get_mut(code)
            .ok_or(AuthError::InvalidGrant("unknown code"))?;
        if entry.consumed {
            return Err(AuthError::InvalidGrant("code already consumed"));
        }
        if entry.is_expired(Utc::now()) {
            entry.consumed = true;
            return Err(AuthError::InvalidGrant("code expired"));
        }
        entry.consumed = true;
        Ok(entry.clone())
    }

    pub fn issue_token(
        &self,
        user_id: String,
        email: Option<String>,
        scopes: BTreeSet<String>,
        client_id: String,
    ) -> AccessToken {
        let now = Utc::now();
        let token = AccessToken {
            token: uuid::Uuid::new_v4().to_string(),
            user_id,
            email,
            scopes,
            client_id,
            created_at: now,
            expires_at: now + Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            refresh_token: uuid::Uuid::new_v4().to_string(),
        };
        let mut guard = self.inner.write();
        guard
            .refresh_index
            .insert(token.refresh_token.clone(), token.token.clone());
        guard.tokens.insert(token.token.clone(), token.clone());
        token
    }

    /// O(1) lookup by token string (spec §3 invariant).
    pub fn lookup_token(&self, token: &str) -> Result<AccessToken, AuthError> {
        let guard = self.inner.read();
        let entry = guard.tokens.get(token).ok_or(AuthError::InvalidToken)?;
        if entry.is_expired(Utc::now()) {
            return Err(AuthError::InvalidToken);
        }
        Ok(entry.clone())
    }

    pub fn revoke_token(&self, token: &str) {
        let mut guard = self.inner.write();
        if let Some(entry) = guard.tokens.remove(token) {
            guard.refresh_index.remove(&entry.refresh_token);
        }
    }

    /// Rotates a refresh token: the old access token is invalidated and a
    /// fresh access/refresh pair is issued with the same identity and
    /// scopes (spec §3: "refresh rotates the access token's value").
    pub fn rotate(&self, refresh_token: &str) -> Result<AccessToken, AuthError> {
        let old_token = {
            let guard = self.inner.read();
            guard
                .refresh_index
                .get(refresh_token)
                .cloned()
                .ok_or(AuthError::InvalidToken)?
        };
        let old = {
            let mut guard = self.inner.write();
            guard.tokens.remove(&old_token).ok_or(AuthError::InvalidToken)?
        };
        Ok(self.issue_token(old.user_id, old.email, old.scopes, old.client_id))
    }
}
