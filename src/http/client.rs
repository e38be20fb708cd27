use std::collections::{BTreeMap, HashMap};
use std::error::Error as _;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy};
use tracing::debug;

use super::request::RequestSpec;
use super::response::ResponseRecord;
use crate::config::RunConfig;
use crate::error::{ConfigError, ExecutionError, TransportKind};

pub type ExecuteFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ResponseRecord, ExecutionError>> + Send + 'a>>;

/// Performs exactly one call per request. Implementations must not retry.
pub trait Executor: Send + Sync {
    fn execute<'a>(&'a self, request: &'a RequestSpec) -> ExecuteFuture<'a>;
}

/// reqwest-backed executor with a per-call timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeout_ms: u64,
}

impl HttpClient {
    pub fn new(config: &RunConfig) -> Result<Self, ConfigError> {
        let mut builder = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(config.timeout());

        if let Some(proxy_url) = config.proxy() {
            let proxy = Proxy::all(proxy_url).map_err(|err| ConfigError::InvalidProxy {
                url: proxy_url.to_string(),
                reason: err.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }

        if !config.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|err| ConfigError::Client(err.to_string()))?;

        Ok(Self {
            client,
            timeout_ms: config.timeout_ms,
        })
    }

    async fn send(&self, request: &RequestSpec) -> Result<ResponseRecord, ExecutionError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|err| ExecutionError::InvalidRequest(format!("invalid URL `{}`: {err}", request.url)))?;
        let headers = build_headers(&request.headers)?;

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .headers(headers);
        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body)
                .map_err(|err| ExecutionError::InvalidRequest(format!("unserializable body: {err}")))?;
            builder = builder.body(bytes);
        }

        debug!(method = %request.method, url = %request.url, "sending request");
        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|err| classify_reqwest_error(&err, self.timeout_ms))?;

        let status = response.status();
        let mut response_headers = HashMap::new();
        for (key, value) in response.headers() {
            response_headers.insert(
                key.to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            );
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| classify_reqwest_error(&err, self.timeout_ms))?;
        let elapsed = started.elapsed();
        debug!(
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            size = bytes.len(),
            "received response"
        );

        Ok(ResponseRecord::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            response_headers,
            String::from_utf8_lossy(&bytes).into_owned(),
            elapsed,
        ))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Executor for HttpClient {
    fn execute<'a>(&'a self, request: &'a RequestSpec) -> ExecuteFuture<'a> {
        Box::pin(self.send(request))
    }
}

fn build_headers(input: &BTreeMap<String, String>) -> Result<HeaderMap, ExecutionError> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        if key.is_empty() {
            continue;
        }

        let header_name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| ExecutionError::InvalidRequest(format!("invalid header name `{key}`: {err}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|err| ExecutionError::InvalidRequest(format!("invalid header value for `{key}`: {err}")))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// Full message including the source chain; reqwest hides the interesting
/// part (DNS, refused, TLS) behind "error sending request".
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn classify_reqwest_error(err: &reqwest::Error, timeout_ms: u64) -> ExecutionError {
    if err.is_timeout() {
        return ExecutionError::Timeout { timeout_ms };
    }
    if err.is_builder() {
        return ExecutionError::InvalidRequest(error_chain(err));
    }

    let message = error_chain(err);
    let lowered = message.to_ascii_lowercase();
    let kind = if lowered.contains("dns")
        || lowered.contains("failed to lookup address")
        || lowered.contains("name or service not known")
    {
        TransportKind::Dns
    } else if lowered.contains("tls") || lowered.contains("ssl") || lowered.contains("certificate") {
        TransportKind::Tls
    } else if err.is_connect() {
        TransportKind::Connect
    } else if err.is_body() || err.is_decode() || err.is_request() {
        TransportKind::Read
    } else {
        TransportKind::Other
    };

    ExecutionError::Transport { kind, message }
}
