//! # Command Line
//!
//! Arguments for running the bundled contract scenario from CI. Flags
//! override values loaded from `--config`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::RunConfig;
use crate::error::{ConfigError, ReporterError};
use crate::report::{ConsoleReporter, FanoutReporter, JsonFileReporter, OutputFormat, SqliteReporter};
use crate::scenarios::MERCADO_BASE_URL;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    #[default]
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "contract-runner", version, about = "Run the market service contract scenario")]
pub struct Cli {
    /// JSON run configuration (camelCase keys).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Service root that relative step URLs are joined onto.
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
    /// Per-request timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
    /// Bound for the whole run in milliseconds.
    #[arg(long, value_name = "MS")]
    pub deadline_ms: Option<u64>,
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,
    /// Accept invalid TLS certificates.
    #[arg(long)]
    pub insecure: bool,
    /// Seed for generated payloads; a random one is logged when omitted.
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    pub format: FormatArg,
    /// Also write the finished run as JSON to this file.
    #[arg(long, value_name = "PATH")]
    pub report_json: Option<PathBuf>,
    /// Also append the run to this SQLite database.
    #[arg(long, value_name = "PATH")]
    pub report_sqlite: Option<PathBuf>,
    /// Emit logs as JSON lines on stderr.
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Effective configuration: file (or defaults) first, then flags.
    pub fn run_config(&self) -> Result<RunConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::new(MERCADO_BASE_URL),
        };
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(deadline_ms) = self.deadline_ms {
            config.run_deadline_ms = Some(deadline_ms);
        }
        if let Some(proxy) = &self.proxy {
            config.proxy_url = Some(proxy.clone());
        }
        if self.insecure {
            config.verify_ssl = false;
        }
        config.validate()?;
        Ok(config)
    }

    /// Console output plus any file sinks that were asked for.
    pub fn reporter(&self) -> Result<FanoutReporter, ReporterError> {
        let mut reporter = FanoutReporter::new().with(ConsoleReporter::new(
            std::io::stdout(),
            self.format.into(),
        ));
        if let Some(path) = &self.report_json {
            reporter.push(Box::new(JsonFileReporter::new(path)));
        }
        if let Some(path) = &self.report_sqlite {
            reporter.push(Box::new(SqliteReporter::open(path)?));
        }
        Ok(reporter)
    }
}
