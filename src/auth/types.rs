// Authentication types

use serde::Deserialize;

/// OAuth2 grant types understood by the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    /// Application credential, no end user involved
    ClientCredentials,

    /// End-user sign-in with identifier and password
    Password,

    /// Silent renewal of a user credential
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::ClientCredentials => "client_credentials",
            GrantType::Password => "password",
            GrantType::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A grant request together with its grant-specific fields
#[derive(Clone, PartialEq)]
pub enum Grant {
    ClientCredentials,
    Password { username: String, password: String },
    /// `None` is passed through to the server as-is
    RefreshToken { refresh_token: Option<String> },
}

impl Grant {
    pub fn grant_type(&self) -> GrantType {
        match self {
            Grant::ClientCredentials => GrantType::ClientCredentials,
            Grant::Password { .. } => GrantType::Password,
            Grant::RefreshToken { .. } => GrantType::RefreshToken,
        }
    }
}

// Secrets stay out of logs
impl std::fmt::Debug for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grant::ClientCredentials => f.write_str("ClientCredentials"),
            Grant::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Grant::RefreshToken { refresh_token } => f
                .debug_struct("RefreshToken")
                .field("present", &refresh_token.is_some())
                .finish(),
        }
    }
}

/// Which credential an authorized call runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    App,
    User,
}

impl std::fmt::Display for TokenScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenScope::App => f.write_str("app"),
            TokenScope::User => f.write_str("user"),
        }
    }
}

/// Handling of the previous refresh token when a refresh response omits a new one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshTokenPolicy {
    /// Overwrite the whole credential; the refresh token becomes absent
    #[default]
    Clear,

    /// Carry the previous refresh token forward
    Keep,
}

/// Application credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCredential {
    pub access_token: String,
    pub expires_at_ms: i64,
}

impl AppCredential {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms
    }
}

/// End-user credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredential {
    pub access_token: String,
    pub expires_at_ms: i64,
    pub refresh_token: Option<String>,
}

impl UserCredential {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms
    }
}

/// Token endpoint payload
///
/// The `ok` envelope flag is checked on the `ApiResponse` before decoding.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPayload {
    pub access_token: Option<String>,
    /// Lifetime in seconds
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
}

impl TokenPayload {
    /// Absolute expiry for a token acquired at `now_ms`
    ///
    /// A missing `expires_in` yields a token that is valid only at `now_ms`.
    pub fn expires_at(&self, now_ms: i64) -> i64 {
        now_ms.saturating_add(self.expires_in.unwrap_or(0).saturating_mul(1000))
    }
}

/// Wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Short prefix of a token for log output
pub fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{}...", prefix)
}
