use bytes::Bytes;
use serde_json::Value;

// ==================================================================================================
// Transport Output
// ==================================================================================================

/// Status code and undecoded body exactly as the transport received them
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

// ==================================================================================================
// Parsed API Response
// ==================================================================================================

/// API response with the envelope fields every endpoint shares
///
/// The API wraps every payload in `{ "ok": bool, "error"?: string, ... }`.
/// A body that is not JSON parses to `Value::Null` with `ok = false`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    pub ok: bool,
    pub error: Option<String>,
}

impl ApiResponse {
    /// Decode a raw transport response
    pub fn parse(raw: &RawResponse) -> Self {
        let body = serde_json::from_slice(&raw.body).unwrap_or_else(|e| {
            tracing::debug!(
                status = raw.status,
                error = %e,
                "Response body is not JSON"
            );
            Value::Null
        });
        Self::from_json(raw.status, body)
    }

    /// Build a response from an already decoded body
    pub fn from_json(status: u16, body: Value) -> Self {
        let ok = body.get("ok").and_then(Value::as_bool).unwrap_or(false);
        let error = body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            status,
            body,
            ok,
            error,
        }
    }

    /// HTTP 200 with the body's success flag set
    pub fn is_success(&self) -> bool {
        self.status == 200 && self.ok
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Whether the body carries a non-empty domain error
    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Look up a top-level body field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }
}
