use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::{Config, CONTENT_TYPE_FORM, CONTENT_TYPE_JSON};
use crate::error::{ApiError, Result};
use crate::models::RawResponse;

pub const SDK_LANGUAGE_HEADER: &str = "X-GIGANTIER-SDK-LANGUAGE";
pub const SDK_VERSION_HEADER: &str = "X-GIGANTIER-SDK-VERSION";
pub const SDK_APPLICATION_HEADER: &str = "X-GIGANTIER-SDK-APPLICATION";
pub const SDK_LANGUAGE: &str = "rust";
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Outgoing request body
pub type JsonBody = Map<String, Value>;

/// HTTP POST collaborator
///
/// Implementations must hand back the body of non-2xx responses instead of
/// turning them into errors; only network-level failures are `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: &JsonBody,
    ) -> Result<RawResponse>;
}

/// Headers sent with every request
///
/// Starts from the caller's `Config::headers` and fills in content-type and
/// SDK identification headers only where the caller has not set a header of
/// the same name (case-insensitive).
pub fn build_headers(config: &Config) -> HashMap<String, String> {
    let mut headers = config.headers.clone();

    let mut defaults = vec![
        ("Content-Type", config.content_type.clone()),
        ("Accept", config.content_type.clone()),
        (SDK_LANGUAGE_HEADER, SDK_LANGUAGE.to_string()),
        (SDK_VERSION_HEADER, SDK_VERSION.to_string()),
    ];
    if let Some(ref application) = config.application {
        defaults.push((SDK_APPLICATION_HEADER, application.clone()));
    }

    for (name, value) in defaults {
        if !headers.keys().any(|k| k.eq_ignore_ascii_case(name)) {
            headers.insert(name.to_string(), value);
        }
    }

    headers
}

/// Value of a header, matched case-insensitively
pub fn header_value<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Flatten a body into form fields; strings go out unquoted, `null` as empty
fn form_fields(body: &JsonBody) -> Vec<(String, String)> {
    body.iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

/// Transport backed by a shared reqwest client
pub struct ReqwestTransport {
    /// Shared HTTP client with connection pooling
    client: Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: u64, request_timeout: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(config.connect_timeout, config.request_timeout)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: &JsonBody,
    ) -> Result<RawResponse> {
        let content_type = header_value(headers, "Content-Type").unwrap_or(CONTENT_TYPE_JSON);

        let mut builder = self.client.post(url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match content_type {
            CONTENT_TYPE_JSON => builder.json(body),
            CONTENT_TYPE_FORM => builder.form(&form_fields(body)),
            other => return Err(ApiError::InvalidContentType(other.to_string())),
        };

        tracing::debug!(url = %url, "Sending HTTP request");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                // Categorize the error for better debugging
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection_failed"
                } else if e.is_request() {
                    "request_error"
                } else if e.is_body() {
                    "body_error"
                } else {
                    "unknown"
                };

                tracing::error!(
                    error_kind = error_kind,
                    error = %e,
                    url = %url,
                    "HTTP request failed"
                );
                return Err(ApiError::Transport(e));
            }
        };

        let status = response.status().as_u16();
        let body = response.bytes().await?;

        tracing::debug!(status = status, url = %url, "Received HTTP response");

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_default_headers() {
        let config = Config {
            application: Some("TestApp".to_string()),
            ..Config::new("C", "S", "Sc")
        };
        let headers = build_headers(&config);

        assert_eq!(headers["Content-Type"], "application/json");
        assert_eq!(headers["Accept"], "application/json");
        assert_eq!(headers[SDK_LANGUAGE_HEADER], "rust");
        assert_eq!(headers[SDK_VERSION_HEADER], SDK_VERSION);
        assert_eq!(headers[SDK_APPLICATION_HEADER], "TestApp");
    }

    #[test]
    fn test_application_header_is_optional() {
        let headers = build_headers(&Config::new("C", "S", "Sc"));
        assert!(!headers.contains_key(SDK_APPLICATION_HEADER));
    }

    #[test]
    fn test_caller_headers_win() {
        let mut config = Config::new("C", "S", "Sc");
        config
            .headers
            .insert("accept".to_string(), "application/vnd.custom+json".to_string());
        config
            .headers
            .insert("X-Request-Source".to_string(), "batch".to_string());

        let headers = build_headers(&config);
        assert_eq!(header_value(&headers, "Accept"), Some("application/vnd.custom+json"));
        assert_eq!(headers.keys().filter(|k| k.eq_ignore_ascii_case("accept")).count(), 1);
        assert_eq!(headers["X-Request-Source"], "batch");
        assert_eq!(headers["Content-Type"], "application/json");
    }

    #[test]
    fn test_form_fields() {
        let body = json!({"grant_type": "refresh_token", "refresh_token": null, "page": 2});
        let mut fields = form_fields(body.as_object().unwrap());
        fields.sort();

        assert_eq!(
            fields,
            vec![
                ("grant_type".to_string(), "refresh_token".to_string()),
                ("page".to_string(), "2".to_string()),
                ("refresh_token".to_string(), String::new()),
            ]
        );
    }

    #[tokio::test]
    async fn test_unsupported_content_type_fails_before_sending() {
        let transport = ReqwestTransport::new(1, 1).unwrap();
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "text/plain".to_string());

        // Unroutable URL: reaching the network would produce a transport error instead
        let result = transport
            .post("http://127.0.0.1:1/api/v1/x", &headers, &JsonBody::new())
            .await;
        assert!(matches!(result, Err(ApiError::InvalidContentType(ref ct)) if ct == "text/plain"));
    }

    proptest! {
        #[test]
        fn prop_custom_header_values_preserved(name in "[A-Za-z][A-Za-z-]{0,15}", value in "[ -~]{0,20}") {
            let mut config = Config::new("C", "S", "Sc");
            config.headers.insert(name.clone(), value.clone());

            let headers = build_headers(&config);
            prop_assert_eq!(headers.get(&name), Some(&value));
            let matching = headers.keys().filter(|k| k.eq_ignore_ascii_case(&name)).count();
            prop_assert_eq!(matching, 1);
        }
    }
}
