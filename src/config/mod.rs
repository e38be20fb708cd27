//! # Run Configuration
//!
//! Everything a run needs from the outside world is passed in through
//! [`RunConfig`]; nothing is read from process-wide state.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_verify_ssl() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Relative step URLs are joined onto this.
    pub base_url: String,
    /// Bound for a single HTTP call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Bound for the whole run. Calls still in flight when it passes are
    /// aborted and recorded as timeouts.
    #[serde(default)]
    pub run_deadline_ms: Option<u64>,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    /// Read-only `{{name}}` values, shadowed by captures of the same name.
    #[serde(default)]
    pub variables: HashMap<String, Value>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            run_deadline_ms: None,
            proxy_url: None,
            verify_ssl: true,
            default_headers: BTreeMap::new(),
            variables: HashMap::new(),
        }
    }
}

impl RunConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|err| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: err.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme `{}`", url.scheme()),
            });
        }
        if self.timeout_ms == 0 || self.run_deadline_ms == Some(0) {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_ms.map(Duration::from_millis)
    }

    /// Proxy URL with surrounding whitespace removed; blank counts as unset.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn defaults_apply_when_fields_omitted() {
        let config: RunConfig =
            serde_json::from_value(json!({"baseUrl": "https://api.example.com"})).unwrap();
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.verify_ssl);
        assert!(config.run_deadline_ms.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_base_url_and_zero_timeout() {
        assert!(matches!(
            RunConfig::new("not a url").validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            RunConfig::new("ftp://example.com").validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));

        let mut config = RunConfig::new("https://example.com");
        config.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn blank_proxy_is_unset() {
        let mut config = RunConfig::new("https://example.com");
        config.proxy_url = Some("   ".to_string());
        assert_eq!(config.proxy(), None);
        config.proxy_url = Some(" http://proxy:8080 ".to_string());
        assert_eq!(config.proxy(), Some("http://proxy:8080"));
    }

    #[test]
    fn loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"baseUrl": "http://localhost:3000/mercado", "timeoutMs": 500, "variables": {{"token": "t"}}}}"#
        )
        .unwrap();

        let config = RunConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.variables.get("token"), Some(&json!("t")));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RunConfig::from_json_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
