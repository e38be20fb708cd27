//! # Scenario Runner
//!
//! Drives a scenario one step at a time. Each step moves through
//! `Pending -> Built -> Sent -> Asserted -> (Captured) -> Recorded`; step
//! N+1 starts only after step N is recorded.
//!
//! Infrastructure failures (unresolvable references, timeouts, transport
//! errors) are recorded against the step and the run continues, so a single
//! run reports as much as possible about the service.

use std::fmt::{self, Display};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::assertion::{self, StepOutcome, StepStatus};
use crate::capture::CaptureStore;
use crate::config::RunConfig;
use crate::error::{ConfigError, ExecutionError, ReporterError, StepError};
use crate::http::client::{Executor, HttpClient};
use crate::http::request::RequestSpec;
use crate::http::response::ResponseRecord;
use crate::report::Reporter;
use crate::scenario::{Scenario, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Pending,
    Built,
    Sent,
    Asserted,
    Captured,
    Recorded,
}

impl Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StepPhase::Pending => "pending",
            StepPhase::Built => "built",
            StepPhase::Sent => "sent",
            StepPhase::Asserted => "asserted",
            StepPhase::Captured => "captured",
            StepPhase::Recorded => "recorded",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStart {
    pub scenario: String,
    pub step_count: usize,
    pub started_at_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub passed_count: usize,
    pub failed_count: usize,
    pub error_count: usize,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.passed_count + self.failed_count + self.error_count
    }

    pub fn duration_ms(&self) -> u64 {
        self.ended_at_ms.saturating_sub(self.started_at_ms)
    }
}

/// Everything one run produced, in declared step order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRun {
    pub scenario: String,
    pub outcomes: Vec<StepOutcome>,
    pub summary: RunSummary,
}

impl ScenarioRun {
    pub fn all_passed(&self) -> bool {
        self.summary.failed_count == 0 && self.summary.error_count == 0
    }
}

/// Aborts the call in flight on the runner it came from. Steps that have
/// not started yet are recorded as timeouts without being sent.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: broadcast::Sender<()>,
}

impl CancelHandle {
    /// Returns false when no run is listening.
    pub fn cancel(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or_default()
}

fn cancel_requested(cancel_rx: &mut broadcast::Receiver<()>) -> bool {
    use tokio::sync::broadcast::error::TryRecvError;

    match cancel_rx.try_recv() {
        Ok(_) => true,
        Err(TryRecvError::Lagged(_)) => true,
        Err(TryRecvError::Closed) => false,
        Err(TryRecvError::Empty) => false,
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Per-run mutable state. Created fresh by every [`ScenarioRunner::run`].
struct RunState {
    store: CaptureStore,
    cancel_rx: broadcast::Receiver<()>,
    cancelled: bool,
    deadline: Option<Instant>,
}

pub struct ScenarioRunner<E: Executor> {
    executor: E,
    config: RunConfig,
    cancel_tx: broadcast::Sender<()>,
}

impl ScenarioRunner<HttpClient> {
    pub fn from_config(config: RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = HttpClient::new(&config)?;
        Ok(Self::new(client, config))
    }
}

impl<E: Executor> ScenarioRunner<E> {
    pub fn new(executor: E, config: RunConfig) -> Self {
        let (cancel_tx, _) = broadcast::channel(1);
        Self {
            executor,
            config,
            cancel_tx,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every step in order and return the finished run. Reporter
    /// failures are logged and never change the outcome.
    pub async fn run(&self, scenario: &Scenario, reporter: &mut dyn Reporter) -> ScenarioRun {
        let started_at_ms = now_ms();
        let mut state = RunState {
            store: CaptureStore::with_environment(self.config.variables.clone()),
            cancel_rx: self.cancel_tx.subscribe(),
            cancelled: false,
            deadline: self.config.run_deadline().map(|limit| Instant::now() + limit),
        };

        if let Err(errors) = scenario.validate(&self.config.variables) {
            for err in errors {
                warn!(scenario = scenario.name(), error = %err, "scenario authoring issue");
            }
        }

        info!(
            scenario = scenario.name(),
            steps = scenario.steps().len(),
            base_url = %self.config.base_url,
            "run started"
        );
        let start = RunStart {
            scenario: scenario.name().to_string(),
            step_count: scenario.steps().len(),
            started_at_ms,
        };
        report("on_run_start", reporter.on_run_start(&start));

        let mut outcomes = Vec::with_capacity(scenario.steps().len());
        let mut summary = RunSummary {
            started_at_ms,
            ..RunSummary::default()
        };
        for step in scenario.steps() {
            let outcome = self.run_step(step, &mut state).await;
            match outcome.status() {
                StepStatus::Passed => summary.passed_count += 1,
                StepStatus::Failed => summary.failed_count += 1,
                StepStatus::Error => summary.error_count += 1,
            }
            report("on_step_outcome", reporter.on_step_outcome(&outcome));
            outcomes.push(outcome);
        }
        summary.ended_at_ms = now_ms();

        let run = ScenarioRun {
            scenario: scenario.name().to_string(),
            outcomes,
            summary,
        };
        info!(
            scenario = scenario.name(),
            passed = run.summary.passed_count,
            failed = run.summary.failed_count,
            errors = run.summary.error_count,
            duration_ms = run.summary.duration_ms(),
            "run finished"
        );
        report("on_run_end", reporter.on_run_end(&run));
        run
    }

    async fn run_step(&self, step: &Step, state: &mut RunState) -> StepOutcome {
        let name = step.name();
        let method = step.request().method();
        let mut phase = StepPhase::Pending;
        let mut advance = |next: StepPhase| {
            debug!(step = name, from = %phase, to = %next, "step transition");
            phase = next;
        };

        let spec = match step.request().build(
            &self.config.base_url,
            &self.config.default_headers,
            &state.store,
        ) {
            Ok(spec) => spec,
            Err(err) => {
                let err = StepError::from(err);
                warn!(step = name, error = %err, "request could not be built");
                advance(StepPhase::Recorded);
                return StepOutcome::infrastructure(name, method, None, &err);
            }
        };
        advance(StepPhase::Built);

        let response = match self.send(&spec, state).await {
            Ok(response) => response,
            Err(err) => {
                let err = StepError::from(err);
                warn!(step = name, url = %spec.url, error = %err, "request did not complete");
                advance(StepPhase::Recorded);
                return StepOutcome::infrastructure(name, method, Some(spec.url), &err);
            }
        };
        advance(StepPhase::Sent);

        let failures = assertion::evaluate(&response, step.expectations());
        advance(StepPhase::Asserted);
        for failure in &failures {
            debug!(step = name, kind = %failure.kind, message = %failure.message, "expectation failed");
        }

        let mut captured = Vec::new();
        if failures.is_empty() {
            for capture in step.captures() {
                captured.push(
                    state
                        .store
                        .capture(&capture.name, &capture.path, &response, name)
                        .clone(),
                );
            }
            if !captured.is_empty() {
                advance(StepPhase::Captured);
            }
        } else if !step.captures().is_empty() {
            debug!(step = name, "step failed; skipping its captures");
        }

        advance(StepPhase::Recorded);
        StepOutcome::asserted(name, method, spec.url, &response, failures, captured)
    }

    /// One call, bounded by the executor's own timeout, the run deadline and
    /// the cancel handle, whichever comes first.
    async fn send(
        &self,
        spec: &RequestSpec,
        state: &mut RunState,
    ) -> Result<ResponseRecord, ExecutionError> {
        let deadline_error = || ExecutionError::Timeout {
            timeout_ms: self.config.run_deadline_ms.unwrap_or_default(),
        };

        if !state.cancelled && cancel_requested(&mut state.cancel_rx) {
            state.cancelled = true;
        }
        if state.cancelled {
            return Err(ExecutionError::Cancelled);
        }
        if state.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(deadline_error());
        }

        tokio::select! {
            result = self.executor.execute(spec) => result,
            _ = state.cancel_rx.recv() => {
                state.cancelled = true;
                Err(ExecutionError::Cancelled)
            }
            _ = deadline_reached(state.deadline) => Err(deadline_error()),
        }
    }
}

fn report(hook: &str, result: Result<(), ReporterError>) {
    if let Err(err) = result {
        warn!(hook, error = %err, "reporter failed; outcome unaffected");
    }
}

#[cfg(test)]
mod tests;
