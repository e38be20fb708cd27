use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::Reporter;
use crate::assertion::StepOutcome;
use crate::error::ReporterError;
use crate::runner::{RunStart, ScenarioRun};

/// Writes the finished run as pretty-printed JSON. Nothing is written until
/// the run ends, so a crashed run leaves no partial file behind.
pub struct JsonFileReporter {
    path: PathBuf,
}

impl JsonFileReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Reporter for JsonFileReporter {
    fn on_run_start(&mut self, _start: &RunStart) -> Result<(), ReporterError> {
        Ok(())
    }

    fn on_step_outcome(&mut self, _outcome: &StepOutcome) -> Result<(), ReporterError> {
        Ok(())
    }

    fn on_run_end(&mut self, run: &ScenarioRun) -> Result<(), ReporterError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(run)?;
        fs::write(&self.path, raw)?;
        info!(path = %self.path.display(), "wrote JSON report");
        Ok(())
    }
}
