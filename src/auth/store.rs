// Token storage on top of a PersistentStore

use std::sync::Arc;

use crate::error::Result;
use crate::storage::PersistentStore;

use super::types::{AppCredential, UserCredential};

pub const APP_TOKEN: &str = "app_token";
pub const APP_TOKEN_EXPIRES: &str = "app_token_expires";
pub const USER_TOKEN: &str = "user_token";
pub const USER_TOKEN_EXPIRES: &str = "user_token_expires";
pub const USER_REFRESH_TOKEN: &str = "user_refresh_token";

/// Typed view over the five token keys
///
/// Each credential is written and cleared as a unit: a save first clears
/// every field of that credential, so no field of an older credential can
/// survive next to a newer one. A save that fails part-way clears what it
/// already wrote before returning the error.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn PersistentStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Cached app credential; `None` if never acquired or its token is gone
    ///
    /// A missing or unparseable expiry reads as already expired.
    pub fn app_credential(&self) -> Result<Option<AppCredential>> {
        let Some(access_token) = self.store.get(APP_TOKEN)? else {
            return Ok(None);
        };
        let expires_at_ms = self.read_expiry(APP_TOKEN_EXPIRES)?;

        Ok(Some(AppCredential {
            access_token,
            expires_at_ms,
        }))
    }

    pub fn save_app(&self, credential: &AppCredential) -> Result<()> {
        self.clear_app()?;
        let written = self.write_app(credential);
        if written.is_err() {
            if let Err(e) = self.clear_app() {
                tracing::warn!("Failed to roll back partial app credential: {}", e);
            }
        }
        written
    }

    fn write_app(&self, credential: &AppCredential) -> Result<()> {
        self.store.set(APP_TOKEN, &credential.access_token)?;
        self.store
            .set(APP_TOKEN_EXPIRES, &credential.expires_at_ms.to_string())?;
        Ok(())
    }

    pub fn clear_app(&self) -> Result<()> {
        self.store.remove(APP_TOKEN)?;
        self.store.remove(APP_TOKEN_EXPIRES)?;
        Ok(())
    }

    /// Cached user credential; `None` if never acquired or its token is gone
    pub fn user_credential(&self) -> Result<Option<UserCredential>> {
        let Some(access_token) = self.store.get(USER_TOKEN)? else {
            return Ok(None);
        };
        let expires_at_ms = self.read_expiry(USER_TOKEN_EXPIRES)?;
        let refresh_token = self.refresh_token()?;

        Ok(Some(UserCredential {
            access_token,
            expires_at_ms,
            refresh_token,
        }))
    }

    /// Stored refresh token, independent of the access token
    pub fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.store.get(USER_REFRESH_TOKEN)?)
    }

    pub fn save_user(&self, credential: &UserCredential) -> Result<()> {
        self.clear_user()?;
        let written = self.write_user(credential);
        if written.is_err() {
            if let Err(e) = self.clear_user() {
                tracing::warn!("Failed to roll back partial user credential: {}", e);
            }
        }
        written
    }

    fn write_user(&self, credential: &UserCredential) -> Result<()> {
        self.store.set(USER_TOKEN, &credential.access_token)?;
        self.store
            .set(USER_TOKEN_EXPIRES, &credential.expires_at_ms.to_string())?;
        if let Some(ref refresh_token) = credential.refresh_token {
            self.store.set(USER_REFRESH_TOKEN, refresh_token)?;
        }
        Ok(())
    }

    pub fn clear_user(&self) -> Result<()> {
        self.store.remove(USER_TOKEN)?;
        self.store.remove(USER_TOKEN_EXPIRES)?;
        self.store.remove(USER_REFRESH_TOKEN)?;
        Ok(())
    }

    /// Expiry in epoch milliseconds, `i64::MIN` when missing or corrupt
    fn read_expiry(&self, key: &str) -> Result<i64> {
        let raw = self.store.get(key)?;
        Ok(raw
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or_else(|| {
                tracing::debug!("No usable expiry under {}, treating token as expired", key);
                i64::MIN
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::storage::MemoryStore;

    fn store() -> (TokenStore, MemoryStore) {
        let memory = MemoryStore::new();
        (TokenStore::new(Arc::new(memory.clone())), memory)
    }

    /// Memory store whose writes to one key always fail
    struct FailingStore {
        inner: MemoryStore,
        failing_key: &'static str,
    }

    impl PersistentStore for FailingStore {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            if key == self.failing_key {
                anyhow::bail!("disk full");
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.inner.remove(key)
        }
    }

    fn failing_store(failing_key: &'static str) -> (TokenStore, MemoryStore) {
        let memory = MemoryStore::new();
        let store = FailingStore {
            inner: memory.clone(),
            failing_key,
        };
        (TokenStore::new(Arc::new(store)), memory)
    }

    #[test]
    fn test_failed_user_save_leaves_no_partial_credential() {
        for key in [USER_TOKEN_EXPIRES, USER_REFRESH_TOKEN] {
            let (tokens, memory) = failing_store(key);
            memory.set(USER_TOKEN, "OLD").unwrap();

            let err = tokens
                .save_user(&UserCredential {
                    access_token: "U1".to_string(),
                    expires_at_ms: 1,
                    refresh_token: Some("R1".to_string()),
                })
                .unwrap_err();

            assert!(matches!(err, ApiError::Storage(_)));
            assert_eq!(err.to_string(), "Storage error: disk full");
            assert!(memory.is_empty(), "leftover fields after failing on {}", key);
            assert_eq!(tokens.user_credential().unwrap(), None);
        }
    }

    #[test]
    fn test_failed_app_save_leaves_no_partial_credential() {
        let (tokens, memory) = failing_store(APP_TOKEN_EXPIRES);

        let err = tokens
            .save_app(&AppCredential {
                access_token: "T1".to_string(),
                expires_at_ms: 1,
            })
            .unwrap_err();

        assert!(matches!(err, ApiError::Storage(_)));
        assert!(memory.is_empty());
        assert_eq!(tokens.app_credential().unwrap(), None);
    }

    #[test]
    fn test_app_credential_round_trip() {
        let (tokens, _) = store();
        assert_eq!(tokens.app_credential().unwrap(), None);

        let cred = AppCredential {
            access_token: "T1".to_string(),
            expires_at_ms: 42,
        };
        tokens.save_app(&cred).unwrap();
        assert_eq!(tokens.app_credential().unwrap(), Some(cred));

        tokens.clear_app().unwrap();
        assert_eq!(tokens.app_credential().unwrap(), None);
    }

    #[test]
    fn test_save_user_replaces_every_field() {
        let (tokens, memory) = store();
        tokens
            .save_user(&UserCredential {
                access_token: "U1".to_string(),
                expires_at_ms: 1,
                refresh_token: Some("R1".to_string()),
            })
            .unwrap();

        tokens
            .save_user(&UserCredential {
                access_token: "U2".to_string(),
                expires_at_ms: 2,
                refresh_token: None,
            })
            .unwrap();

        let cred = tokens.user_credential().unwrap().unwrap();
        assert_eq!(cred.access_token, "U2");
        assert_eq!(cred.expires_at_ms, 2);
        assert_eq!(cred.refresh_token, None);
        assert_eq!(memory.get(USER_REFRESH_TOKEN).unwrap(), None);
    }

    #[test]
    fn test_clear_user_removes_all_fields() {
        let (tokens, memory) = store();
        tokens
            .save_user(&UserCredential {
                access_token: "U1".to_string(),
                expires_at_ms: 1,
                refresh_token: Some("R1".to_string()),
            })
            .unwrap();

        tokens.clear_user().unwrap();
        assert!(memory.is_empty());
        assert_eq!(tokens.user_credential().unwrap(), None);
    }

    #[test]
    fn test_missing_or_corrupt_expiry_reads_as_expired() {
        let (tokens, memory) = store();
        memory.set(APP_TOKEN, "T1").unwrap();
        let cred = tokens.app_credential().unwrap().unwrap();
        assert!(cred.is_expired(0));

        memory.set(APP_TOKEN_EXPIRES, "not-a-number").unwrap();
        let cred = tokens.app_credential().unwrap().unwrap();
        assert!(cred.is_expired(0));
    }

    #[test]
    fn test_credentials_are_independent() {
        let (tokens, _) = store();
        tokens
            .save_app(&AppCredential {
                access_token: "T1".to_string(),
                expires_at_ms: 1,
            })
            .unwrap();
        tokens
            .save_user(&UserCredential {
                access_token: "U1".to_string(),
                expires_at_ms: 1,
                refresh_token: Some("R1".to_string()),
            })
            .unwrap();

        tokens.clear_user().unwrap();
        assert!(tokens.app_credential().unwrap().is_some());
    }
}
