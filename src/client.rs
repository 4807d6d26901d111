use anyhow::Context;
use std::sync::Arc;

use crate::auth::{TokenAuthority, TokenScope, TokenStore};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::executor::RequestExecutor;
use crate::models::ApiResponse;
use crate::storage::PersistentStore;
use crate::transport::{JsonBody, ReqwestTransport, Transport};

/// Gigantier API client
///
/// Owns the token state for one session. Calls against one client may be
/// issued concurrently; token acquisition is serialized internally.
pub struct SessionClient {
    config: Arc<Config>,
    authority: Arc<TokenAuthority>,
    executor: RequestExecutor,
}

impl SessionClient {
    /// Create a client that talks HTTP through reqwest
    pub fn new(config: Config, store: Arc<dyn PersistentStore>) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&config)
            .context("Failed to initialize transport")
            .map_err(|e| ApiError::Config(format!("{:#}", e)))?;
        Self::with_transport(config, Arc::new(transport), store)
    }

    /// Create a client on top of any transport
    pub fn with_transport(
        config: Config,
        transport: Arc<dyn Transport>,
        store: Arc<dyn PersistentStore>,
    ) -> Result<Self> {
        config.validate()?;

        let config = Arc::new(config);
        let authority = Arc::new(TokenAuthority::new(
            config.clone(),
            transport.clone(),
            TokenStore::new(store),
        ));
        let executor = RequestExecutor::new(config.clone(), transport, authority.clone());

        tracing::debug!(
            host = %config.host,
            retries = config.retries,
            "Session client ready"
        );

        Ok(Self {
            config,
            authority,
            executor,
        })
    }

    /// Sign a user in; yields the bare access token
    ///
    /// A rejected sign-in is `Err(ApiError::GrantFailed(response))` carrying
    /// the token endpoint's response.
    pub async fn authenticate_user(&self, identifier: &str, secret: &str) -> Result<String> {
        self.authority
            .authenticate_with_password(identifier, secret)
            .await
    }

    /// Call an endpoint with the application token
    pub async fn call(&self, uri: &str, body: Option<JsonBody>) -> Result<ApiResponse> {
        self.executor
            .execute(uri, body.unwrap_or_default(), TokenScope::App, self.config.retries)
            .await
    }

    /// Call an endpoint with the signed-in user's token
    pub async fn authenticated_call(&self, uri: &str, body: Option<JsonBody>) -> Result<ApiResponse> {
        self.executor
            .execute(uri, body.unwrap_or_default(), TokenScope::User, self.config.retries)
            .await
    }

    /// Forget the signed-in user; the app credential is untouched
    pub fn sign_out(&self) -> Result<()> {
        self.authority.sign_out()
    }

    /// Stored credentials
    pub fn tokens(&self) -> &TokenStore {
        self.authority.tokens()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
