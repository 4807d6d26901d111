use serde_json::Value;
use std::sync::Arc;

use crate::auth::types::mask_token;
use crate::auth::{TokenAuthority, TokenScope};
use crate::config::Config;
use crate::error::Result;
use crate::models::ApiResponse;
use crate::transport::{build_headers, JsonBody, Transport};

/// Executes token-protected calls with a bounded 401 retry policy
pub struct RequestExecutor {
    config: Arc<Config>,

    transport: Arc<dyn Transport>,

    /// Source of app and user tokens
    authority: Arc<TokenAuthority>,
}

impl RequestExecutor {
    pub fn new(
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
        authority: Arc<TokenAuthority>,
    ) -> Self {
        Self {
            config,
            transport,
            authority,
        }
    }

    /// Execute a POST to `uri` with the token for `scope` in the body
    ///
    /// - Token acquisition failure is returned before any call is made.
    /// - 200 with `ok=true` is returned as success.
    /// - 401 while retries remain force-renews the token and repeats the call.
    /// - Anything else, including a 401 with no retries left, is returned
    ///   unchanged for the caller to inspect.
    pub async fn execute(
        &self,
        uri: &str,
        mut body: JsonBody,
        scope: TokenScope,
        retries: u32,
    ) -> Result<ApiResponse> {
        let url = self.config.build_url(uri);
        let headers = build_headers(&self.config);
        let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();

        let mut token = self.authority.token(scope, false).await?;
        let mut retries_remaining = retries;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            body.insert("access_token".to_string(), Value::String(token.clone()));

            tracing::debug!(
                request_id = %request_id,
                url = %url,
                scope = %scope,
                attempt = attempt,
                token = %mask_token(&token),
                "Executing authorized request"
            );

            let raw = self.transport.post(&url, &headers, &body).await?;
            let response = ApiResponse::parse(&raw);

            if response.is_success() {
                tracing::debug!(request_id = %request_id, status = response.status, "Request successful");
                return Ok(response);
            }

            if response.is_unauthorized() {
                if retries_remaining > 0 {
                    tracing::warn!(
                        request_id = %request_id,
                        scope = %scope,
                        "Received 401, renewing token and retrying ({} retries left)",
                        retries_remaining - 1
                    );

                    token = self.authority.token(scope, true).await?;
                    retries_remaining -= 1;
                    continue;
                }

                tracing::warn!(
                    request_id = %request_id,
                    url = %url,
                    attempts = attempt,
                    "Still unauthorized after all retries"
                );
            } else {
                tracing::debug!(
                    request_id = %request_id,
                    status = response.status,
                    error = ?response.error,
                    "Request returned an unsuccessful response"
                );
            }

            return Ok(response);
        }
    }
}
