use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::method::HttpMethod;
use crate::capture::{self, CaptureStore};
use crate::error::CaptureError;

/// A fully resolved request, ready for the executor. No placeholders remain
/// in any field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

/// Declared request shape. URL, header values and JSON body may contain
/// `{{name}}` placeholders that are resolved by [`RequestTemplate::build`].
///
/// Every builder method consumes the template and returns a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTemplate {
    method: HttpMethod,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl RequestTemplate {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Every placeholder name this request depends on.
    pub fn references(&self) -> Vec<String> {
        let mut names = capture::references(&self.url);
        for (_, value) in &self.headers {
            names.extend(capture::references(value));
        }
        if let Some(body) = &self.body {
            names.extend(capture::json_references(body));
        }
        names
    }

    /// Placeholder fragments that can never resolve: `{{` without `}}`,
    /// or an empty name.
    pub fn malformed_placeholders(&self) -> Vec<String> {
        let mut fragments: Vec<String> = capture::malformed(&self.url).into_iter().collect();
        for (_, value) in &self.headers {
            fragments.extend(capture::malformed(value));
        }
        if let Some(body) = &self.body {
            fragments.extend(capture::json_malformed(body));
        }
        fragments
    }

    /// Resolve placeholders against `store` and join relative URLs onto
    /// `base_url`. Values substituted into the URL are percent-encoded;
    /// header and body values are inserted as they are. Step headers
    /// override `default_headers` with the same name (case-insensitive).
    pub fn build(
        &self,
        base_url: &str,
        default_headers: &BTreeMap<String, String>,
        store: &CaptureStore,
    ) -> Result<RequestSpec, CaptureError> {
        let path = capture::interpolate_url(&self.url, store)?;
        let url = join_url(base_url, &path);

        let mut headers: BTreeMap<String, String> = default_headers
            .iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value.clone()))
            .collect();
        for (key, value) in &self.headers {
            let value = capture::interpolate(value, store, &format!("header `{key}`"))?;
            headers.insert(key.to_ascii_lowercase(), value);
        }

        let body = match &self.body {
            Some(_) if !self.method.allows_body() => {
                debug!(method = %self.method, url = %url, "dropping body declared on a bodiless method");
                None
            }
            Some(body) => Some(capture::interpolate_json(body, store, "body")?),
            None => None,
        };
        if body.is_some() {
            headers
                .entry("content-type".to_string())
                .or_insert_with(|| "application/json".to_string());
        }

        Ok(RequestSpec {
            method: self.method,
            url,
            headers,
            body,
        })
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}
