//! Scripted transport for exercising the token lifecycle without a network.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::Result;
use crate::models::RawResponse;
use crate::transport::{JsonBody, Transport};

/// A request as the transport saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: JsonBody,
}

/// Transport that answers from a FIFO queue and records every request
///
/// Panics when a request arrives with no scripted response left, so a test
/// issuing more requests than expected fails loudly.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<RawResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON response
    pub fn push_json(&self, status: u16, body: Value) {
        self.push(RawResponse::new(status, body.to_string()));
    }

    pub fn push(&self, response: RawResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Scripted responses not consumed yet
    pub fn pending(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: &JsonBody,
    ) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            headers: headers.clone(),
            body: body.clone(),
        });

        let response = self.responses.lock().unwrap().pop_front();
        match response {
            Some(response) => Ok(response),
            None => panic!("MockTransport: no scripted response for {}", url),
        }
    }
}
