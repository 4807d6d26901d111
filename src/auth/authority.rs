use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::transport::Transport;

use super::grant;
use super::store::TokenStore;
use super::types::{
    mask_token, now_millis, AppCredential, Grant, RefreshTokenPolicy, TokenPayload, TokenScope,
    UserCredential,
};

/// Token authority
/// Decides between cached and freshly granted tokens for both credential kinds
///
/// Acquisition is serialized per credential kind. A non-forced request that
/// waited on the lock re-reads the cache, so callers racing on an empty
/// cache share one grant exchange.
pub struct TokenAuthority {
    config: Arc<Config>,

    /// Transport used for token endpoint calls
    transport: Arc<dyn Transport>,

    /// Credential storage
    tokens: TokenStore,

    /// Serializes app credential acquisition
    app_lock: Mutex<()>,

    /// Serializes user credential acquisition
    user_lock: Mutex<()>,
}

impl TokenAuthority {
    pub fn new(config: Arc<Config>, transport: Arc<dyn Transport>, tokens: TokenStore) -> Self {
        Self {
            config,
            transport,
            tokens,
            app_lock: Mutex::new(()),
            user_lock: Mutex::new(()),
        }
    }

    /// Token for the given scope
    pub async fn token(&self, scope: TokenScope, force_renew: bool) -> Result<String> {
        match scope {
            TokenScope::App => self.app_token(force_renew).await,
            TokenScope::User => self.user_token(force_renew).await,
        }
    }

    /// Cached app token, or a new one from a client-credentials grant
    pub async fn app_token(&self, force_renew: bool) -> Result<String> {
        let _guard = self.app_lock.lock().await;

        if !force_renew {
            if let Some(cred) = self.tokens.app_credential()? {
                if !cred.is_expired(now_millis()) {
                    tracing::debug!("Using cached app token");
                    return Ok(cred.access_token);
                }
                tracing::debug!("Cached app token expired at {}", cred.expires_at_ms);
            }
        }

        match self.request_grant(&Grant::ClientCredentials).await {
            Ok((payload, access_token, acquired_at)) => {
                let cred = AppCredential {
                    access_token,
                    expires_at_ms: payload.expires_at(acquired_at),
                };
                self.tokens.save_app(&cred)?;

                tracing::info!(
                    "App token acquired ({}), expires at {}",
                    mask_token(&cred.access_token),
                    cred.expires_at_ms
                );
                Ok(cred.access_token)
            }
            Err(e) => {
                if e.invalidates_credential() {
                    tracing::warn!("App token grant failed, clearing app credential: {}", e);
                    self.tokens.clear_app()?;
                }
                Err(e)
            }
        }
    }

    /// Cached user token, or a renewed one from a refresh grant
    ///
    /// The refresh grant is sent even when no refresh token is stored; the
    /// server decides what an absent refresh token means.
    pub async fn user_token(&self, force_renew: bool) -> Result<String> {
        let _guard = self.user_lock.lock().await;

        if !force_renew {
            if let Some(cred) = self.tokens.user_credential()? {
                if !cred.is_expired(now_millis()) {
                    tracing::debug!("Using cached user token");
                    return Ok(cred.access_token);
                }
                tracing::debug!("Cached user token expired at {}", cred.expires_at_ms);
            }
        }

        let refresh_token = self.tokens.refresh_token()?;
        if refresh_token.is_none() {
            tracing::debug!("No refresh token stored, sending refresh grant without one");
        }

        let grant = Grant::RefreshToken {
            refresh_token: refresh_token.clone(),
        };
        self.acquire_user(&grant, refresh_token).await
    }

    /// Sign a user in with a password grant
    pub async fn authenticate_with_password(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<String> {
        let _guard = self.user_lock.lock().await;

        let grant = Grant::Password {
            username: identifier.to_string(),
            password: secret.to_string(),
        };
        self.acquire_user(&grant, None).await
    }

    /// Forget the user credential
    pub fn sign_out(&self) -> Result<()> {
        tracing::debug!("Clearing user credential");
        self.tokens.clear_user()
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    async fn acquire_user(&self, grant: &Grant, previous_refresh: Option<String>) -> Result<String> {
        match self.request_grant(grant).await {
            Ok((payload, access_token, acquired_at)) => {
                let policy = self.config.refresh_token_policy;
                let refresh_token = match (payload.refresh_token.clone(), policy) {
                    (Some(token), _) => Some(token),
                    (None, RefreshTokenPolicy::Keep) => previous_refresh,
                    (None, RefreshTokenPolicy::Clear) => None,
                };

                let cred = UserCredential {
                    access_token,
                    expires_at_ms: payload.expires_at(acquired_at),
                    refresh_token,
                };
                self.tokens.save_user(&cred)?;

                tracing::info!(
                    grant_type = %grant.grant_type(),
                    "User token acquired ({}), expires at {}",
                    mask_token(&cred.access_token),
                    cred.expires_at_ms
                );
                Ok(cred.access_token)
            }
            Err(e) => {
                if e.invalidates_credential() {
                    tracing::warn!(
                        grant_type = %grant.grant_type(),
                        "User token grant failed, clearing user credential: {}",
                        e
                    );
                    self.tokens.clear_user()?;
                }
                Err(e)
            }
        }
    }

    /// Run a grant; yields the payload, the access token and the acquisition time
    async fn request_grant(&self, grant: &Grant) -> Result<(TokenPayload, String, i64)> {
        let response = grant::exchange(self.transport.as_ref(), &self.config, grant).await?;
        let acquired_at = now_millis();
        let (payload, access_token) = grant::into_payload(response)?;
        Ok((payload, access_token, acquired_at))
    }
}
