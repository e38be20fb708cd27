use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

/// What came back from one HTTP call. Built once by the executor and only
/// read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    status: u16,
    status_text: String,
    headers: HashMap<String, String>,
    body: Option<Value>,
    raw_body: String,
    elapsed: Duration,
}

impl ResponseRecord {
    /// Header names are stored lowercase. The body is parsed as JSON when
    /// possible; an empty or non-JSON payload leaves `body()` as `None`.
    pub fn new(
        status: u16,
        status_text: impl Into<String>,
        headers: HashMap<String, String>,
        raw_body: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        let raw_body = raw_body.into();
        let body = if raw_body.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&raw_body).ok()
        };
        let headers = headers
            .into_iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value))
            .collect();

        Self {
            status,
            status_text: status_text.into(),
            headers,
            body,
            raw_body,
            elapsed,
        }
    }

    /// Shorthand used by tests and fakes: a JSON response with no headers.
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: HashMap::new(),
            raw_body: body.to_string(),
            body: Some(body),
            elapsed: Duration::ZERO,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn raw_body(&self) -> &str {
        &self.raw_body
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
