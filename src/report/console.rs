use std::io::Write;

use serde_json::json;

use super::Reporter;
use crate::assertion::{StepOutcome, StepStatus};
use crate::error::ReporterError;
use crate::runner::{RunStart, ScenarioRun};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per line, one line per event.
    Json,
}

/// Writes events to a stream (stdout in the binary) as they arrive.
pub struct ConsoleReporter<W: Write + Send> {
    out: W,
    format: OutputFormat,
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_text_outcome(&mut self, outcome: &StepOutcome) -> Result<(), ReporterError> {
        let timing = match (outcome.status_code, outcome.elapsed_ms) {
            (Some(status), Some(elapsed)) => format!(" ({status}, {elapsed} ms)"),
            _ => String::new(),
        };
        let target = outcome.url.as_deref().unwrap_or("<unresolved>");

        match outcome.status() {
            StepStatus::Passed => {
                writeln!(self.out, "  PASS  {}{timing}", outcome.step_name)?;
            }
            StepStatus::Failed => {
                writeln!(self.out, "  FAIL  {}{timing}", outcome.step_name)?;
                writeln!(self.out, "        {} {target}", outcome.method)?;
                for failure in &outcome.failures {
                    writeln!(
                        self.out,
                        "        {}: expected {}, actual {}",
                        failure.kind, failure.expected, failure.actual
                    )?;
                }
            }
            StepStatus::Error => {
                writeln!(self.out, "  ERROR {}", outcome.step_name)?;
                writeln!(self.out, "        {} {target}", outcome.method)?;
                if let Some(infra) = &outcome.infrastructure {
                    writeln!(self.out, "        [{}] {}", infra.kind, infra.message)?;
                }
            }
        }
        Ok(())
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn on_run_start(&mut self, start: &RunStart) -> Result<(), ReporterError> {
        match self.format {
            OutputFormat::Text => {
                writeln!(self.out, "{} ({} steps)", start.scenario, start.step_count)?;
            }
            OutputFormat::Json => {
                let event = json!({ "event": "run_start", "run": start });
                writeln!(self.out, "{event}")?;
            }
        }
        Ok(())
    }

    fn on_step_outcome(&mut self, outcome: &StepOutcome) -> Result<(), ReporterError> {
        match self.format {
            OutputFormat::Text => self.write_text_outcome(outcome)?,
            OutputFormat::Json => {
                let event = json!({ "event": "step_outcome", "outcome": outcome });
                writeln!(self.out, "{event}")?;
            }
        }
        Ok(())
    }

    fn on_run_end(&mut self, run: &ScenarioRun) -> Result<(), ReporterError> {
        let summary = &run.summary;
        match self.format {
            OutputFormat::Text => {
                writeln!(
                    self.out,
                    "{} passed, {} failed, {} errors in {} ms",
                    summary.passed_count,
                    summary.failed_count,
                    summary.error_count,
                    summary.duration_ms()
                )?;
            }
            OutputFormat::Json => {
                let event = json!({ "event": "run_end", "summary": summary });
                writeln!(self.out, "{event}")?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}
