//! Canonical credential state and its persisted layout
//!
//! [`CredentialStore`] owns the one in-memory [`TokenPair`]. The persisted
//! layout is shared with other readers of the same storage, so every
//! mutation rewrites all of it in a single batch:
//!
//! | key             | content                                            |
//! |-----------------|----------------------------------------------------|
//! | `auth_token`    | access token                                       |
//! | `access_token`  | access token (same value)                          |
//! | `refresh_token` | refresh token                                      |
//! | `auth-storage`  | `{"state": {accessToken, refreshToken, isAuthenticated, ..}, "version": 0}` |
//!
//! On startup [`CredentialStore::load`] reads whichever of those locations
//! is populated and rewrites the full layout, so older sessions written by
//! a single location are migrated once.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::storage::{Change, KeyValueStore};
use super::token::{AccessToken, RefreshToken, TokenPair};
use crate::error::Result;

/// Access token, primary copy
pub const KEY_AUTH_TOKEN: &str = "auth_token";
/// Access token, secondary copy
pub const KEY_ACCESS_TOKEN: &str = "access_token";
/// Refresh token
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";
/// Structured session blob
pub const KEY_SESSION_BLOB: &str = "auth-storage";

/// Owner of the current credential pair
#[derive(Debug)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    current: RwLock<Option<TokenPair>>,
}

impl CredentialStore {
    /// Load credentials from `backend`, migrating legacy layouts.
    ///
    /// Lookup order for the access token is `auth_token`, `access_token`,
    /// then the blob's `state.accessToken`; for the refresh token it is
    /// `refresh_token`, then `state.refreshToken`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read, or if the migrated
    /// layout cannot be written back.
    pub fn load(backend: Arc<dyn KeyValueStore>) -> Result<Self> {
        let blob_state = read_blob(backend.as_ref())?
            .and_then(|blob| blob.get("state").cloned())
            .unwrap_or(Value::Null);

        let access = non_empty(backend.get(KEY_AUTH_TOKEN)?)
            .or(non_empty(backend.get(KEY_ACCESS_TOKEN)?))
            .or_else(|| blob_string(&blob_state, "accessToken"));
        let refresh = non_empty(backend.get(KEY_REFRESH_TOKEN)?)
            .or_else(|| blob_string(&blob_state, "refreshToken"));

        let current = access.map(|a| TokenPair::new(a, refresh.map(RefreshToken::new)));
        let store = Self {
            backend,
            current: RwLock::new(current.clone()),
        };

        if let Some(pair) = current {
            debug!(has_refresh = pair.refresh.is_some(), "Loaded stored credentials");
            store.persist(Some(&pair))?;
        }

        Ok(store)
    }

    /// Start with no credentials, without reading the backend
    #[must_use]
    pub fn empty(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            current: RwLock::new(None),
        }
    }

    /// Current credential pair
    #[must_use]
    pub fn tokens(&self) -> Option<TokenPair> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current access token
    #[must_use]
    pub fn access_token(&self) -> Option<AccessToken> {
        self.tokens().map(|pair| pair.access)
    }

    /// Current refresh token
    #[must_use]
    pub fn refresh_token(&self) -> Option<RefreshToken> {
        self.tokens().and_then(|pair| pair.refresh)
    }

    /// True iff a non-empty access token is held
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some_and(|t| !t.as_str().is_empty())
    }

    /// Replace the access token; `refresh = None` keeps the previous refresh token.
    ///
    /// An empty access token is treated as no token and clears the session.
    /// The in-memory pair is updated even if persisting fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout cannot be written.
    pub fn set_tokens(&self, access: AccessToken, refresh: Option<RefreshToken>) -> Result<()> {
        if access.as_str().is_empty() {
            return self.clear();
        }

        // The guard is held through `persist` so storage sees mutations in
        // the same order as memory.
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let refresh = refresh.or_else(|| current.as_ref().and_then(|p| p.refresh.clone()));
        let pair = TokenPair { access, refresh };
        *current = Some(pair.clone());
        self.persist(Some(&pair))
    }

    /// Forget both tokens. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout cannot be written.
    pub fn clear(&self) -> Result<()> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.take().is_some() {
            info!("Cleared stored credentials");
        }
        self.persist(None)
    }

    // Mutations hold the `current` write guard here, which also serializes
    // the read-modify-write of the session blob.
    fn persist(&self, pair: Option<&TokenPair>) -> Result<()> {
        let access = pair.map(|p| p.access.as_str().to_string());
        let refresh = pair.and_then(|p| p.refresh.as_ref().map(|r| r.as_str().to_string()));

        let mut changes: Vec<Change<'_>> = vec![
            (KEY_AUTH_TOKEN, access.clone()),
            (KEY_ACCESS_TOKEN, access.clone()),
            (KEY_REFRESH_TOKEN, refresh.clone()),
        ];

        let existing = read_blob(self.backend.as_ref())?;
        if pair.is_some() || existing.is_some() {
            let blob = session_blob(existing, access.as_deref(), refresh.as_deref());
            changes.push((KEY_SESSION_BLOB, Some(blob.to_string())));
        }

        self.backend.apply(&changes)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn blob_string(state: &Value, field: &str) -> Option<String> {
    state
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// A malformed blob is treated as absent and overwritten on the next write.
fn read_blob(backend: &dyn KeyValueStore) -> Result<Option<Value>> {
    Ok(backend
        .get(KEY_SESSION_BLOB)?
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        .filter(Value::is_object))
}

fn session_blob(existing: Option<Value>, access: Option<&str>, refresh: Option<&str>) -> Value {
    let mut blob = existing.unwrap_or_else(|| json!({ "version": 0 }));
    let mut state = blob
        .get("state")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);

    state.insert("accessToken".to_string(), json!(access));
    state.insert("refreshToken".to_string(), json!(refresh));
    state.insert("isAuthenticated".to_string(), json!(access.is_some()));

    if let Some(obj) = blob.as_object_mut() {
        obj.insert("state".to_string(), Value::Object(state));
    }
    blob
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::MemoryStore;

    fn blob_state(store: &MemoryStore) -> Value {
        let raw = store.get(KEY_SESSION_BLOB).unwrap().unwrap();
        serde_json::from_str::<Value>(&raw).unwrap()["state"].clone()
    }

    #[test]
    fn test_set_tokens_writes_full_layout() {
        let backend = Arc::new(MemoryStore::new());
        let creds = CredentialStore::load(backend.clone()).unwrap();
        assert!(!creds.is_authenticated());

        creds
            .set_tokens(AccessToken::new("tok1"), Some(RefreshToken::new("ref1")))
            .unwrap();

        assert_eq!(backend.get(KEY_AUTH_TOKEN).unwrap().as_deref(), Some("tok1"));
        assert_eq!(backend.get(KEY_ACCESS_TOKEN).unwrap().as_deref(), Some("tok1"));
        assert_eq!(backend.get(KEY_REFRESH_TOKEN).unwrap().as_deref(), Some("ref1"));
        let state = blob_state(&backend);
        assert_eq!(state["accessToken"], "tok1");
        assert_eq!(state["refreshToken"], "ref1");
        assert_eq!(state["isAuthenticated"], true);
    }

    #[test]
    fn test_set_tokens_retains_refresh_token() {
        let backend = Arc::new(MemoryStore::new());
        let creds = CredentialStore::empty(backend.clone());
        creds
            .set_tokens(AccessToken::new("tok1"), Some(RefreshToken::new("ref1")))
            .unwrap();
        creds.set_tokens(AccessToken::new("tok2"), None).unwrap();

        assert_eq!(creds.access_token(), Some(AccessToken::new("tok2")));
        assert_eq!(creds.refresh_token(), Some(RefreshToken::new("ref1")));
        assert_eq!(backend.get(KEY_REFRESH_TOKEN).unwrap().as_deref(), Some("ref1"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let backend = Arc::new(MemoryStore::new());
        let creds = CredentialStore::empty(backend.clone());
        creds
            .set_tokens(AccessToken::new("tok1"), Some(RefreshToken::new("ref1")))
            .unwrap();

        creds.clear().unwrap();
        let after_first = backend.snapshot();
        creds.clear().unwrap();

        assert!(!creds.is_authenticated());
        assert_eq!(backend.snapshot(), after_first);
        assert_eq!(backend.get(KEY_AUTH_TOKEN).unwrap(), None);
        assert_eq!(backend.get(KEY_REFRESH_TOKEN).unwrap(), None);
        let state = blob_state(&backend);
        assert!(state["accessToken"].is_null());
        assert_eq!(state["isAuthenticated"], false);
    }

    #[test]
    fn test_empty_access_token_clears_session() {
        let backend = Arc::new(MemoryStore::new());
        let creds = CredentialStore::empty(backend.clone());
        creds
            .set_tokens(AccessToken::new("tok1"), Some(RefreshToken::new("ref1")))
            .unwrap();

        creds.set_tokens(AccessToken::new(""), None).unwrap();

        assert!(creds.tokens().is_none());
        assert!(creds.access_token().is_none());
        assert_eq!(backend.get(KEY_AUTH_TOKEN).unwrap(), None);
        assert_eq!(backend.get(KEY_REFRESH_TOKEN).unwrap(), None);
    }

    #[test]
    fn test_concurrent_set_and_clear_keep_storage_in_sync() {
        for _ in 0..500 {
            let backend = Arc::new(MemoryStore::new());
            let creds = Arc::new(CredentialStore::empty(backend.clone()));
            creds
                .set_tokens(AccessToken::new("tok1"), Some(RefreshToken::new("ref1")))
                .unwrap();

            let barrier = Arc::new(std::sync::Barrier::new(2));
            let setter = {
                let (creds, barrier) = (creds.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    creds.set_tokens(AccessToken::new("tok2"), None).unwrap();
                })
            };
            let clearer = {
                let (creds, barrier) = (creds.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    creds.clear().unwrap();
                })
            };
            setter.join().unwrap();
            clearer.join().unwrap();

            let in_memory = creds.access_token().map(|t| t.as_str().to_string());
            assert_eq!(backend.get(KEY_AUTH_TOKEN).unwrap(), in_memory);
            let state = blob_state(&backend);
            assert_eq!(state["isAuthenticated"], in_memory.is_some());
        }
    }

    #[test]
    fn test_load_prefers_flat_keys() {
        let backend = Arc::new(MemoryStore::with_entries([
            (KEY_AUTH_TOKEN, "direct"),
            (KEY_ACCESS_TOKEN, "secondary"),
            (
                KEY_SESSION_BLOB,
                r#"{"state":{"accessToken":"blob","refreshToken":"blob-ref"},"version":0}"#,
            ),
        ]));
        let creds = CredentialStore::load(backend.clone()).unwrap();

        assert_eq!(creds.access_token(), Some(AccessToken::new("direct")));
        assert_eq!(creds.refresh_token(), Some(RefreshToken::new("blob-ref")));
        // Migration rewrote the secondary copies to match.
        assert_eq!(backend.get(KEY_ACCESS_TOKEN).unwrap().as_deref(), Some("direct"));
        assert_eq!(backend.get(KEY_REFRESH_TOKEN).unwrap().as_deref(), Some("blob-ref"));
    }

    #[test]
    fn test_load_from_blob_only() {
        let backend = Arc::new(MemoryStore::with_entries([(
            KEY_SESSION_BLOB,
            r#"{"state":{"accessToken":"blob","refreshToken":"r","userType":"business"},"version":0}"#,
        )]));
        let creds = CredentialStore::load(backend.clone()).unwrap();

        assert!(creds.is_authenticated());
        assert_eq!(backend.get(KEY_AUTH_TOKEN).unwrap().as_deref(), Some("blob"));
        // Unrelated session fields survive the rewrite.
        assert_eq!(blob_state(&backend)["userType"], "business");
    }

    #[test]
    fn test_load_ignores_empty_and_malformed_values() {
        let backend = Arc::new(MemoryStore::with_entries([
            (KEY_AUTH_TOKEN, ""),
            (KEY_SESSION_BLOB, "{not json"),
        ]));
        let creds = CredentialStore::load(backend).unwrap();
        assert!(!creds.is_authenticated());
        assert!(creds.tokens().is_none());
    }
}
