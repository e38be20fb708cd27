//! # Assertions
//!
//! Expectations declared on a step and the engine that checks them against
//! a response. Every expectation is evaluated; a step reports all of its
//! mismatches, not just the first one.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::capture::{self, CapturedValue};
use crate::error::{CaptureError, ExecutionError, StepError};
use crate::http::method::HttpMethod;
use crate::http::response::ResponseRecord;

/// A single check against a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expectation {
    /// Exact status code.
    StatusEquals { status: u16 },
    /// Partial match: every key in the expected object must exist in the
    /// body with a matching value. Keys the expectation does not mention are
    /// ignored. Nested objects match partially too; an expected array
    /// matches when each of its items matches some item of the actual array.
    BodyContains { subset: Value },
    /// JSON Schema (draft 2020-12) conformance, typically `type` and
    /// `required`.
    BodySchemaMatches { schema: Value },
    HeaderEquals { name: String, value: String },
    /// Value at an extraction path (see [`capture::extract`]) equals.
    PathEquals { path: String, value: Value },
    ResponseTimeBelow { millis: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectationKind {
    StatusEquals,
    BodyContains,
    BodySchemaMatches,
    HeaderEquals,
    PathEquals,
    ResponseTimeBelow,
}

impl Display for ExpectationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExpectationKind::StatusEquals => "status equals",
            ExpectationKind::BodyContains => "body contains",
            ExpectationKind::BodySchemaMatches => "body matches schema",
            ExpectationKind::HeaderEquals => "header equals",
            ExpectationKind::PathEquals => "path equals",
            ExpectationKind::ResponseTimeBelow => "response time below",
        };
        write!(f, "{label}")
    }
}

impl Expectation {
    pub fn kind(&self) -> ExpectationKind {
        match self {
            Expectation::StatusEquals { .. } => ExpectationKind::StatusEquals,
            Expectation::BodyContains { .. } => ExpectationKind::BodyContains,
            Expectation::BodySchemaMatches { .. } => ExpectationKind::BodySchemaMatches,
            Expectation::HeaderEquals { .. } => ExpectationKind::HeaderEquals,
            Expectation::PathEquals { .. } => ExpectationKind::PathEquals,
            Expectation::ResponseTimeBelow { .. } => ExpectationKind::ResponseTimeBelow,
        }
    }

    /// The expected side as JSON, for reports.
    pub fn expected(&self) -> Value {
        match self {
            Expectation::StatusEquals { status } => json!(status),
            Expectation::BodyContains { subset } => subset.clone(),
            Expectation::BodySchemaMatches { schema } => schema.clone(),
            Expectation::HeaderEquals { name, value } => json!({ name: value }),
            Expectation::PathEquals { path, value } => json!({ path: value }),
            Expectation::ResponseTimeBelow { millis } => json!(millis),
        }
    }

    /// `None` when the response satisfies the expectation.
    pub fn check(&self, response: &ResponseRecord) -> Option<Failure> {
        let fail = |actual: Value, message: String| {
            Some(Failure {
                kind: self.kind(),
                expected: self.expected(),
                actual,
                message,
            })
        };
        let body = response.body().cloned().unwrap_or(Value::Null);

        match self {
            Expectation::StatusEquals { status } => {
                if response.status() == *status {
                    None
                } else {
                    fail(
                        json!(response.status()),
                        format!("expected status {status}, got {}", response.status()),
                    )
                }
            }
            Expectation::BodyContains { subset } => {
                if response.body().is_some_and(|actual| contains(actual, subset)) {
                    None
                } else {
                    fail(body, "response body does not contain the expected subset".to_string())
                }
            }
            Expectation::BodySchemaMatches { schema } => {
                let errors = schema_errors(schema, response.body());
                if errors.is_empty() {
                    None
                } else {
                    fail(body, errors.join("; "))
                }
            }
            Expectation::HeaderEquals { name, value } => match response.header(name) {
                Some(actual) if actual == value => None,
                Some(actual) => fail(
                    json!(actual),
                    format!("header `{name}` is `{actual}`, expected `{value}`"),
                ),
                None => fail(Value::Null, format!("header `{name}` is absent")),
            },
            Expectation::PathEquals { path, value } => {
                match response.body().and_then(|body| capture::extract(body, path)) {
                    Some(actual) if actual == value => None,
                    Some(actual) => fail(
                        actual.clone(),
                        format!("value at `{path}` is {actual}, expected {value}"),
                    ),
                    None => fail(Value::Null, format!("path `{path}` is absent in the response")),
                }
            }
            Expectation::ResponseTimeBelow { millis } => {
                let elapsed = response.elapsed().as_millis() as u64;
                if elapsed < *millis {
                    None
                } else {
                    fail(
                        json!(elapsed),
                        format!("response took {elapsed} ms, limit {millis} ms"),
                    )
                }
            }
        }
    }
}

/// Check every expectation in order and collect every mismatch.
pub fn evaluate(response: &ResponseRecord, expectations: &[Expectation]) -> Vec<Failure> {
    expectations
        .iter()
        .filter_map(|expectation| expectation.check(response))
        .collect()
}

/// Partial structural match of `expected` inside `actual`.
pub fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected.iter().all(|(key, value)| {
            actual
                .get(key)
                .is_some_and(|candidate| contains(candidate, value))
        }),
        (Value::Array(actual), Value::Array(expected)) => expected
            .iter()
            .all(|value| actual.iter().any(|candidate| contains(candidate, value))),
        (actual, expected) => actual == expected,
    }
}

fn schema_errors(schema: &Value, body: Option<&Value>) -> Vec<String> {
    let validator = match jsonschema::options()
        .with_draft(jsonschema::Draft::Draft202012)
        .build(schema)
    {
        Ok(validator) => validator,
        Err(err) => return vec![format!("invalid schema: {err}")],
    };
    let Some(body) = body else {
        return vec!["response has no JSON body".to_string()];
    };
    validator
        .iter_errors(body)
        .map(|err| err.to_string())
        .collect()
}

/// One unmet expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub kind: ExpectationKind,
    pub expected: Value,
    pub actual: Value,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InfrastructureKind {
    UnresolvedReference,
    Timeout,
    Transport,
    InvalidRequest,
}

impl Display for InfrastructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InfrastructureKind::UnresolvedReference => "UNRESOLVED_REFERENCE",
            InfrastructureKind::Timeout => "TIMEOUT",
            InfrastructureKind::Transport => "TRANSPORT_ERROR",
            InfrastructureKind::InvalidRequest => "INVALID_REQUEST",
        };
        write!(f, "{label}")
    }
}

/// A step that never reached assertion: the request could not be built or
/// the call did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureFailure {
    pub kind: InfrastructureKind,
    pub message: String,
}

impl From<&StepError> for InfrastructureFailure {
    fn from(err: &StepError) -> Self {
        let kind = match err {
            StepError::Capture(
                CaptureError::UnknownCapture { .. }
                | CaptureError::UnresolvedReference { .. }
                | CaptureError::MissingValue { .. }
                | CaptureError::MalformedPlaceholder { .. },
            ) => InfrastructureKind::UnresolvedReference,
            StepError::Capture(CaptureError::InvalidUrlValue { .. }) => {
                InfrastructureKind::InvalidRequest
            }
            StepError::Execution(ExecutionError::Timeout { .. } | ExecutionError::Cancelled) => {
                InfrastructureKind::Timeout
            }
            StepError::Execution(ExecutionError::Transport { .. }) => InfrastructureKind::Transport,
            StepError::Execution(ExecutionError::InvalidRequest(_)) => {
                InfrastructureKind::InvalidRequest
            }
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Error,
}

/// Final record of one step. Built once when the step finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub step_name: String,
    pub method: HttpMethod,
    /// Resolved URL; `None` when the request could not be built.
    pub url: Option<String>,
    pub passed: bool,
    pub failures: Vec<Failure>,
    pub infrastructure: Option<InfrastructureFailure>,
    pub status_code: Option<u16>,
    pub elapsed_ms: Option<u64>,
    pub captures: Vec<CapturedValue>,
}

impl StepOutcome {
    pub fn asserted(
        step_name: &str,
        method: HttpMethod,
        url: String,
        response: &ResponseRecord,
        failures: Vec<Failure>,
        captures: Vec<CapturedValue>,
    ) -> Self {
        Self {
            step_name: step_name.to_string(),
            method,
            url: Some(url),
            passed: failures.is_empty(),
            failures,
            infrastructure: None,
            status_code: Some(response.status()),
            elapsed_ms: Some(response.elapsed().as_millis() as u64),
            captures,
        }
    }

    pub fn infrastructure(
        step_name: &str,
        method: HttpMethod,
        url: Option<String>,
        error: &StepError,
    ) -> Self {
        Self {
            step_name: step_name.to_string(),
            method,
            url,
            passed: false,
            failures: Vec::new(),
            infrastructure: Some(InfrastructureFailure::from(error)),
            status_code: None,
            elapsed_ms: None,
            captures: Vec::new(),
        }
    }

    pub fn status(&self) -> StepStatus {
        if self.infrastructure.is_some() {
            StepStatus::Error
        } else if self.passed {
            StepStatus::Passed
        } else {
            StepStatus::Failed
        }
    }
}
