use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised while resolving `{{name}}` references against the
/// capture store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("unknown capture `{name}`: no earlier step captured it")]
    UnknownCapture { name: String },
    #[error("unresolved reference `{name}` in {location}")]
    UnresolvedReference { name: String, location: String },
    #[error("capture `{name}` is missing: path `{path}` was absent in the response of step `{source_step}`")]
    MissingValue {
        name: String,
        path: String,
        source_step: String,
    },
    #[error("malformed placeholder `{fragment}` in {location}")]
    MalformedPlaceholder { fragment: String, location: String },
    #[error("capture `{name}` cannot be used in a URL: {reason}")]
    InvalidUrlValue { name: String, reason: String },
}

/// Failures raised while performing a single HTTP call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("transport failure ({kind}): {message}")]
    Transport { kind: TransportKind, message: String },
    #[error("request cancelled")]
    Cancelled,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Connection-level failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportKind {
    Dns,
    Connect,
    Tls,
    Read,
    Other,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransportKind::Dns => "DNS_ERROR",
            TransportKind::Connect => "CONNECT_ERROR",
            TransportKind::Tls => "TLS_ERROR",
            TransportKind::Read => "READ_ERROR",
            TransportKind::Other => "TRANSPORT_ERROR",
        };
        write!(f, "{label}")
    }
}

/// Any fault that stops a step before its expectations can be evaluated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Reporter sinks fail with this; the runner logs and swallows it.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("report I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("report database failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("reporter is not ready: {0}")]
    NotReady(String),
}

/// Authoring defects detectable before any request is sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("scenario has no steps")]
    EmptyScenario,
    #[error("duplicate step name `{0}`")]
    DuplicateStepName(String),
    #[error("step `{step}` references `{name}`, which is only captured by later step `{captured_by}`")]
    ForwardReference {
        step: String,
        name: String,
        captured_by: String,
    },
    #[error("step `{step}` references `{name}`, which no step captures")]
    UndeclaredReference { step: String, name: String },
    #[error("step `{step}` has malformed placeholder `{fragment}`")]
    MalformedPlaceholder { step: String, fragment: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("timeout must be greater than 0 ms")]
    InvalidTimeout,
    #[error("invalid proxy URL `{url}`: {reason}")]
    InvalidProxy { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("failed to read config file `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
