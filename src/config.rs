use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::auth::RefreshTokenPolicy;
use crate::error::ApiError;

pub const DEFAULT_HOST: &str = "api.gigantier.com";
pub const DEFAULT_PROTOCOL: &str = "https";
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_AUTH_PATH: &str = "/OAuth/token";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Gigantier SDK command-line client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// OAuth client id
    #[arg(long, env = "GIGANTIER_CLIENT_ID")]
    pub client_id: String,

    /// OAuth client secret
    #[arg(long, env = "GIGANTIER_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// OAuth scope requested on every grant
    #[arg(long, env = "GIGANTIER_SCOPE", default_value = "")]
    pub scope: String,

    /// API host (optionally with :port)
    #[arg(short = 'H', long, env = "GIGANTIER_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// URL scheme (http or https)
    #[arg(long, env = "GIGANTIER_PROTOCOL", default_value = DEFAULT_PROTOCOL)]
    pub protocol: String,

    /// API version path segment (empty to omit)
    #[arg(long = "api-version", env = "GIGANTIER_API_VERSION", default_value = DEFAULT_API_VERSION)]
    pub api_version: String,

    /// Application name sent in the SDK identification headers
    #[arg(short, long, env = "GIGANTIER_APPLICATION")]
    pub application: Option<String>,

    /// Retries after a 401 on an authorized call
    #[arg(long, env = "GIGANTIER_RETRIES", default_value = "1")]
    pub retries: u32,

    /// What to do with the old refresh token when a refresh omits one (clear, keep)
    #[arg(long, env = "GIGANTIER_REFRESH_POLICY", default_value = "clear")]
    pub refresh_policy: String,

    /// Path to the SQLite session store
    #[arg(short, long, env = "GIGANTIER_STORE")]
    pub store: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Sign in with a password grant and keep the user session
    Authenticate {
        /// User identifier (usually the e-mail)
        identifier: String,

        /// Password; prompted for when omitted
        #[arg(long, env = "GIGANTIER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Call an endpoint with the application token
    Call {
        /// Endpoint path, e.g. /Category/list
        uri: String,

        /// JSON object sent as the request body
        #[arg(short, long)]
        body: Option<String>,
    },

    /// Call an endpoint with the signed-in user's token
    UserCall {
        /// Endpoint path, e.g. /User/me
        uri: String,

        /// JSON object sent as the request body
        #[arg(short, long)]
        body: Option<String>,
    },

    /// Forget the stored user session
    SignOut,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Client credentials
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,

    // Endpoint
    pub host: String,
    pub protocol: String,
    pub version: Option<String>,
    pub auth_path: String,

    // Request shape
    pub content_type: String,
    pub application: Option<String>,
    pub headers: HashMap<String, String>,

    // Retry and token policy
    pub retries: u32,
    pub refresh_token_policy: RefreshTokenPolicy,

    // HTTP client
    pub connect_timeout: u64,
    pub request_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            scope: String::new(),
            host: DEFAULT_HOST.to_string(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            version: Some(DEFAULT_API_VERSION.to_string()),
            auth_path: DEFAULT_AUTH_PATH.to_string(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            application: None,
            headers: HashMap::new(),
            retries: 1,
            refresh_token_policy: RefreshTokenPolicy::Clear,
            connect_timeout: 30,
            request_timeout: 60,
        }
    }
}

impl Config {
    /// Configuration for the given client with every other setting defaulted
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
            ..Self::default()
        }
    }

    /// Build configuration from parsed CLI arguments (CLI > ENV > defaults)
    pub fn from_args(args: &CliArgs) -> Self {
        Self {
            client_id: args.client_id.clone(),
            client_secret: args.client_secret.clone(),
            scope: args.scope.clone(),
            host: args.host.clone(),
            protocol: args.protocol.clone(),
            version: Some(args.api_version.clone()).filter(|v| !v.is_empty()),
            application: args.application.clone().filter(|a| !a.is_empty()),
            retries: args.retries,
            refresh_token_policy: parse_refresh_policy(&args.refresh_policy),
            ..Self::default()
        }
    }

    /// Load `.env`, parse CLI arguments and build the configuration
    pub fn load() -> Result<(Self, CliArgs)> {
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        Ok((Self::from_args(&args), args))
    }

    /// `<protocol>://<host>/api[/<version>]<path>`
    pub fn build_url(&self, path: &str) -> String {
        format!("{}://{}{}", self.protocol, self.host, self.build_path(path))
    }

    /// `/api[/<version>]<path>`
    pub fn build_path(&self, path: &str) -> String {
        match self.version.as_deref() {
            Some(version) => format!("/api/{}{}", version, path),
            None => format!("/api{}", path),
        }
    }

    /// URL of the token endpoint
    pub fn token_url(&self) -> String {
        self.build_url(&self.auth_path)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), ApiError> {
        if self.client_id.trim().is_empty() {
            return Err(ApiError::Config("client_id is required".to_string()));
        }
        if self.client_secret.is_empty() {
            return Err(ApiError::Config("client_secret is required".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(ApiError::Config("host is required".to_string()));
        }
        if !matches!(self.protocol.as_str(), "http" | "https") {
            return Err(ApiError::Config(format!(
                "unsupported protocol: {}",
                self.protocol
            )));
        }
        if !is_supported_content_type(&self.content_type) {
            return Err(ApiError::InvalidContentType(self.content_type.clone()));
        }

        Ok(())
    }
}

/// Content types the transport knows how to encode
pub fn is_supported_content_type(content_type: &str) -> bool {
    matches!(content_type, CONTENT_TYPE_JSON | CONTENT_TYPE_FORM)
}

/// Default session store location under the user's data directory
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gigantier")
        .join("session.sqlite3")
}

/// Expand tilde (~) in file paths to user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse refresh token policy from string
fn parse_refresh_policy(s: &str) -> RefreshTokenPolicy {
    match s.to_lowercase().as_str() {
        "keep" => RefreshTokenPolicy::Keep,
        _ => RefreshTokenPolicy::Clear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec![
            "gigantier",
            "--client-id",
            "C",
            "--client-secret",
            "S",
            "--scope",
            "Sc",
        ];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.host, "api.gigantier.com");
        assert_eq!(config.protocol, "https");
        assert_eq!(config.version.as_deref(), Some("v1"));
        assert_eq!(config.auth_path, "/OAuth/token");
        assert_eq!(config.content_type, "application/json");
        assert_eq!(config.retries, 1);
        assert_eq!(config.refresh_token_policy, RefreshTokenPolicy::Clear);
        assert!(config.application.is_none());
    }

    #[test]
    fn test_build_url() {
        let config = Config::new("C", "S", "Sc");
        assert_eq!(
            config.build_url("/Category/list"),
            "https://api.gigantier.com/api/v1/Category/list"
        );
        assert_eq!(
            config.token_url(),
            "https://api.gigantier.com/api/v1/OAuth/token"
        );
    }

    #[test]
    fn test_build_path_without_version() {
        let config = Config {
            version: None,
            ..Config::new("C", "S", "Sc")
        };
        assert_eq!(config.build_path("/User/me"), "/api/User/me");
    }

    #[test]
    fn test_validate() {
        assert!(Config::new("C", "S", "Sc").validate().is_ok());

        let err = Config::new("", "S", "Sc").validate().unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));

        let err = Config::new("C", "", "Sc").validate().unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));

        let config = Config {
            protocol: "ftp".to_string(),
            ..Config::new("C", "S", "Sc")
        };
        assert!(matches!(config.validate(), Err(ApiError::Config(_))));

        let config = Config {
            content_type: "text/plain".to_string(),
            ..Config::new("C", "S", "Sc")
        };
        assert!(matches!(
            config.validate(),
            Err(ApiError::InvalidContentType(_))
        ));
    }

    #[test]
    fn test_from_args() {
        let args = args(&[
            "--host",
            "localhost:8080",
            "--protocol",
            "http",
            "--api-version",
            "testv",
            "--application",
            "TestApp",
            "--retries",
            "3",
            "--refresh-policy",
            "keep",
            "call",
            "/Category/list",
        ]);
        let config = Config::from_args(&args);

        assert_eq!(config.client_id, "C");
        assert_eq!(config.client_secret, "S");
        assert_eq!(config.scope, "Sc");
        assert_eq!(
            config.build_url("/Category/list"),
            "http://localhost:8080/api/testv/Category/list"
        );
        assert_eq!(config.application.as_deref(), Some("TestApp"));
        assert_eq!(config.retries, 3);
        assert_eq!(config.refresh_token_policy, RefreshTokenPolicy::Keep);
        assert_eq!(
            args.command,
            Command::Call {
                uri: "/Category/list".to_string(),
                body: None
            }
        );
    }

    #[test]
    fn test_from_args_empty_version_is_omitted() {
        let config = Config::from_args(&args(&["--api-version", "", "sign-out"]));
        assert!(config.version.is_none());
        assert_eq!(config.build_path("/x"), "/api/x");
    }

    #[test]
    fn test_parse_refresh_policy() {
        assert_eq!(parse_refresh_policy("keep"), RefreshTokenPolicy::Keep);
        assert_eq!(parse_refresh_policy("KEEP"), RefreshTokenPolicy::Keep);
        assert_eq!(parse_refresh_policy("clear"), RefreshTokenPolicy::Clear);
        assert_eq!(parse_refresh_policy("unknown"), RefreshTokenPolicy::Clear);
        assert_eq!(parse_refresh_policy(""), RefreshTokenPolicy::Clear);
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/gigantier/session.sqlite3");
        assert!(path.to_string_lossy().contains("gigantier/session.sqlite3"));
        assert!(!path.to_string_lossy().starts_with('~'));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));

        // Just "~" without slash should not expand
        assert_eq!(expand_tilde("~"), PathBuf::from("~"));
    }

    #[test]
    fn test_default_store_path() {
        let path = default_store_path();
        assert!(path.ends_with("gigantier/session.sqlite3"));
    }

    proptest! {
        #[test]
        fn prop_build_url_shape(version in "[a-z0-9]{1,6}", path in "(/[A-Za-z]{1,8}){1,3}") {
            let config = Config {
                version: Some(version.clone()),
                ..Config::new("C", "S", "Sc")
            };
            let url = config.build_url(&path);
            let expected_prefix = format!("https://api.gigantier.com/api/{}", version);
            prop_assert!(url.starts_with(&expected_prefix));
            prop_assert!(url.ends_with(&path));
            prop_assert_eq!(url.len(), expected_prefix.len() + path.len());
        }
    }
}
