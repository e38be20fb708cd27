//! # Reporting
//!
//! A [`Reporter`] receives the run lifecycle as it happens: one start
//! event, one outcome per step in declared order, one end event with the
//! finished run. Sinks may fail; the runner logs the error and carries on.

mod console;
mod json_file;
mod sqlite;

use tracing::warn;

use crate::assertion::StepOutcome;
use crate::error::ReporterError;
use crate::runner::{RunStart, ScenarioRun};

pub use console::{ConsoleReporter, OutputFormat};
pub use json_file::JsonFileReporter;
pub use sqlite::SqliteReporter;

pub trait Reporter: Send {
    fn on_run_start(&mut self, start: &RunStart) -> Result<(), ReporterError>;

    fn on_step_outcome(&mut self, outcome: &StepOutcome) -> Result<(), ReporterError>;

    fn on_run_end(&mut self, run: &ScenarioRun) -> Result<(), ReporterError>;
}

/// Forwards every event to each sink. A failing sink does not stop the
/// others; the first error is returned after all sinks have been called.
#[derive(Default)]
pub struct FanoutReporter {
    sinks: Vec<Box<dyn Reporter>>,
}

impl FanoutReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl Reporter + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn Reporter>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(
        &mut self,
        mut call: impl FnMut(&mut dyn Reporter) -> Result<(), ReporterError>,
    ) -> Result<(), ReporterError> {
        let mut first_error = None;
        for (idx, sink) in self.sinks.iter_mut().enumerate() {
            if let Err(err) = call(sink.as_mut()) {
                warn!(sink = idx, error = %err, "report sink failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Reporter for FanoutReporter {
    fn on_run_start(&mut self, start: &RunStart) -> Result<(), ReporterError> {
        self.each(|sink| sink.on_run_start(start))
    }

    fn on_step_outcome(&mut self, outcome: &StepOutcome) -> Result<(), ReporterError> {
        self.each(|sink| sink.on_step_outcome(outcome))
    }

    fn on_run_end(&mut self, run: &ScenarioRun) -> Result<(), ReporterError> {
        self.each(|sink| sink.on_run_end(run))
    }
}
