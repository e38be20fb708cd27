//! # Capture Store
//!
//! Values pulled out of earlier responses so later steps can reference them
//! as `{{name}}`. A store lives for exactly one scenario run.
//!
//! A capture whose path is absent in the response is stored as
//! [`CaptureState::Missing`] rather than dropped, so a typo in the capture
//! path surfaces on the first step that uses it instead of leaking an empty
//! value into later URLs and bodies.

mod template;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::http::response::ResponseRecord;

pub use template::{
    interpolate, interpolate_json, interpolate_url, json_malformed, json_references, malformed,
    references,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum CaptureState {
    Present(Value),
    Missing,
}

impl CaptureState {
    pub fn is_missing(&self) -> bool {
        matches!(self, CaptureState::Missing)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            CaptureState::Present(value) => Some(value),
            CaptureState::Missing => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedValue {
    pub name: String,
    pub path: String,
    pub state: CaptureState,
    pub source_step: String,
}

/// Run-scoped variable namespace: captures layered over read-only
/// environment variables.
#[derive(Debug, Clone, Default)]
pub struct CaptureStore {
    captures: HashMap<String, CapturedValue>,
    environment: HashMap<String, Value>,
}

impl CaptureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment variables answer lookups that no capture covers.
    pub fn with_environment(environment: HashMap<String, Value>) -> Self {
        Self {
            captures: HashMap::new(),
            environment,
        }
    }

    /// Extract `path` from the response body and store it under `name`,
    /// replacing any earlier capture with the same name.
    pub fn capture(
        &mut self,
        name: &str,
        path: &str,
        response: &ResponseRecord,
        source_step: &str,
    ) -> &CapturedValue {
        let state = match response.body().and_then(|body| extract(body, path)) {
            Some(value) => {
                debug!(capture = name, path, step = source_step, "captured value");
                CaptureState::Present(value.clone())
            }
            None => {
                warn!(
                    capture = name,
                    path,
                    step = source_step,
                    "capture path absent in response; stored as missing"
                );
                CaptureState::Missing
            }
        };

        let captured = CapturedValue {
            name: name.to_string(),
            path: path.to_string(),
            state,
            source_step: source_step.to_string(),
        };
        self.captures.insert(name.to_string(), captured);
        &self.captures[name]
    }

    /// Look up a capture by name. Environment variables are not captures
    /// and are not returned here.
    pub fn resolve(&self, name: &str) -> Result<&CapturedValue, CaptureError> {
        self.captures
            .get(name)
            .ok_or_else(|| CaptureError::UnknownCapture {
                name: name.to_string(),
            })
    }

    /// The usable value behind `name`: a present capture first, then an
    /// environment variable. A missing capture is an error even when an
    /// environment variable of the same name exists.
    pub fn value(&self, name: &str) -> Result<&Value, CaptureError> {
        if let Some(captured) = self.captures.get(name) {
            return match &captured.state {
                CaptureState::Present(value) => Ok(value),
                CaptureState::Missing => Err(CaptureError::MissingValue {
                    name: captured.name.clone(),
                    path: captured.path.clone(),
                    source_step: captured.source_step.clone(),
                }),
            };
        }

        self.environment
            .get(name)
            .ok_or_else(|| CaptureError::UnknownCapture {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.captures.contains_key(name) || self.environment.contains_key(name)
    }

    pub fn captures(&self) -> impl Iterator<Item = &CapturedValue> {
        self.captures.values()
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

/// Resolve an extraction path against a JSON document.
///
/// Paths starting with `/` are JSON pointers (`/items/0/_id`). Anything else
/// is a dotted path where numeric segments index arrays (`items.0._id`).
/// The empty path selects the whole document.
pub fn extract<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(body);
    }
    if path.starts_with('/') {
        return body.pointer(path);
    }

    path.split('.').try_fold(body, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}
