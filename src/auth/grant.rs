// Token endpoint exchange

use serde_json::Value;

use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::ApiResponse;
use crate::transport::{build_headers, JsonBody, Transport};

use super::types::{Grant, TokenPayload};

/// Request body for a grant: client fields merged with grant-specific ones
pub fn grant_body(config: &Config, grant: &Grant) -> JsonBody {
    let mut body = JsonBody::new();
    body.insert(
        "grant_type".to_string(),
        Value::from(grant.grant_type().as_str()),
    );
    body.insert("client_id".to_string(), Value::from(config.client_id.as_str()));
    body.insert(
        "client_secret".to_string(),
        Value::from(config.client_secret.as_str()),
    );
    body.insert("scope".to_string(), Value::from(config.scope.as_str()));

    match grant {
        Grant::ClientCredentials => {}
        Grant::Password { username, password } => {
            body.insert("username".to_string(), Value::from(username.as_str()));
            body.insert("password".to_string(), Value::from(password.as_str()));
        }
        Grant::RefreshToken { refresh_token } => {
            body.insert(
                "refresh_token".to_string(),
                refresh_token
                    .as_deref()
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            );
        }
    }

    body
}

/// POST a grant to the token endpoint and return the parsed response
pub async fn exchange(
    transport: &dyn Transport,
    config: &Config,
    grant: &Grant,
) -> Result<ApiResponse> {
    let url = config.token_url();
    let headers = build_headers(config);
    let body = grant_body(config, grant);

    tracing::debug!(
        url = %url,
        grant_type = %grant.grant_type(),
        "Requesting token"
    );

    let raw = transport.post(&url, &headers, &body).await?;
    Ok(ApiResponse::parse(&raw))
}

/// Accept a successful grant response or turn it into an error
///
/// Non-200 or `ok=false` responses become [`ApiError::GrantFailed`] carrying
/// the response itself.
pub fn into_payload(response: ApiResponse) -> Result<(TokenPayload, String)> {
    if !response.is_success() {
        return Err(ApiError::GrantFailed(response));
    }

    let payload: TokenPayload = serde_json::from_value(response.body)
        .map_err(|e| ApiError::InvalidTokenResponse(e.to_string()))?;

    let access_token = payload
        .access_token
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ApiError::InvalidTokenResponse("response does not contain access_token".to_string())
        })?;

    Ok((payload, access_token))
}
