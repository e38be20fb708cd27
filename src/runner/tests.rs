use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::assertion::InfrastructureKind;
use crate::error::TransportKind;
use crate::http::client::ExecuteFuture;
use crate::http::method::HttpMethod;

const BASE: &str = "http://svc.test/mercado";

enum Reply {
    Respond(ResponseRecord),
    Fail(ExecutionError),
    Hang,
}

/// Replays canned replies in order and records every request it receives.
struct Scripted {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<RequestSpec>>,
}

impl Scripted {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::default(),
        }
    }

    fn seen_urls(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|spec| spec.url.clone()).collect()
    }
}

impl Executor for Scripted {
    fn execute<'a>(&'a self, request: &'a RequestSpec) -> ExecuteFuture<'a> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(request.clone());
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Respond(response)) => Ok(response),
                Some(Reply::Fail(err)) => Err(err),
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(ExecutionError::Timeout { timeout_ms: 30_000 })
                }
                None => Err(ExecutionError::InvalidRequest("script exhausted".to_string())),
            }
        })
    }
}

/// Reporter that keeps every event and can be told to fail on all of them.
#[derive(Clone, Default)]
struct Collect {
    steps: Arc<Mutex<Vec<String>>>,
    ended: Arc<Mutex<bool>>,
    fail: bool,
}

impl Reporter for Collect {
    fn on_run_start(&mut self, _start: &RunStart) -> Result<(), ReporterError> {
        if self.fail {
            return Err(ReporterError::NotReady("sink offline".to_string()));
        }
        Ok(())
    }

    fn on_step_outcome(&mut self, outcome: &StepOutcome) -> Result<(), ReporterError> {
        self.steps.lock().unwrap().push(outcome.step_name.clone());
        if self.fail {
            return Err(ReporterError::NotReady("sink offline".to_string()));
        }
        Ok(())
    }

    fn on_run_end(&mut self, _run: &ScenarioRun) -> Result<(), ReporterError> {
        *self.ended.lock().unwrap() = true;
        if self.fail {
            return Err(ReporterError::NotReady("sink offline".to_string()));
        }
        Ok(())
    }
}

fn runner(replies: Vec<Reply>) -> ScenarioRunner<Scripted> {
    ScenarioRunner::new(Scripted::new(replies), RunConfig::new(BASE))
}

fn ok(status: u16, body: serde_json::Value) -> Reply {
    Reply::Respond(ResponseRecord::json(status, body))
}

fn infra_kind(outcome: &StepOutcome) -> Option<InfrastructureKind> {
    outcome.infrastructure.as_ref().map(|infra| infra.kind)
}

#[tokio::test]
async fn captured_id_flows_into_later_url() {
    let runner = runner(vec![ok(201, json!({"_id": 42})), ok(200, json!({}))]);
    let scenario = Scenario::new("market")
        .step(Step::post("create", "/").json(json!({"nome": "x"})).expect_status(201).capture("id", "_id"))
        .step(Step::delete("delete", "/{{id}}").expect_status(200));

    let run = runner.run(&scenario, &mut Collect::default()).await;

    assert!(run.all_passed());
    assert_eq!(
        runner.executor.seen_urls(),
        vec![BASE.to_string(), format!("{BASE}/42")]
    );
    assert_eq!(run.outcomes[0].captures.len(), 1);
    assert_eq!(run.outcomes[0].captures[0].state.as_value(), Some(&json!(42)));
}

#[tokio::test]
async fn outcomes_follow_declared_order_and_reach_reporter() {
    let runner = runner(vec![ok(200, json!([])), ok(400, json!({})), ok(200, json!([]))]);
    let scenario = Scenario::new("order")
        .step(Step::get("first", "/").expect_status(200))
        .step(Step::post("second", "/").expect_status(201))
        .step(Step::get("third", "/").expect_status(200));
    let mut reporter = Collect::default();

    let run = runner.run(&scenario, &mut reporter).await;

    let names: Vec<_> = run.outcomes.iter().map(|o| o.step_name.as_str()).collect();
    assert_eq!(names, vec!["first", "second", "third"]);
    assert_eq!(*reporter.steps.lock().unwrap(), vec!["first", "second", "third"]);
    assert!(*reporter.ended.lock().unwrap());
    assert_eq!(run.summary.passed_count, 2);
    assert_eq!(run.summary.failed_count, 1);
    assert_eq!(run.summary.total(), 3);
}

#[tokio::test]
async fn every_expectation_is_evaluated() {
    let runner = runner(vec![ok(400, json!({"nome": "other"}))]);
    let scenario = Scenario::new("all").step(
        Step::post("create", "/")
            .expect_status(201)
            .expect_body_contains(json!({"nome": "expected"})),
    );

    let run = runner.run(&scenario, &mut Collect::default()).await;

    let outcome = &run.outcomes[0];
    assert_eq!(outcome.status(), StepStatus::Failed);
    assert_eq!(outcome.failures.len(), 2);
}

#[tokio::test]
async fn failed_step_captures_nothing_and_dependent_step_errors_without_io() {
    let runner = runner(vec![ok(500, json!({"_id": 9}))]);
    let scenario = Scenario::new("dependent")
        .step(Step::post("create", "/").expect_status(201).capture("id", "_id"))
        .step(Step::delete("delete", "/{{id}}").expect_status(200));

    let run = runner.run(&scenario, &mut Collect::default()).await;

    assert_eq!(run.outcomes[0].status(), StepStatus::Failed);
    assert!(run.outcomes[0].captures.is_empty());
    assert_eq!(infra_kind(&run.outcomes[1]), Some(InfrastructureKind::UnresolvedReference));
    assert_eq!(run.outcomes[1].url, None);
    assert_eq!(runner.executor.seen_urls().len(), 1);
}

#[tokio::test]
async fn forward_reference_errors_before_any_call() {
    let runner = runner(vec![ok(201, json!({"_id": 1}))]);
    let scenario = Scenario::new("forward")
        .step(Step::delete("delete", "/{{id}}").expect_status(200))
        .step(Step::post("create", "/").expect_status(201).capture("id", "_id"));

    let run = runner.run(&scenario, &mut Collect::default()).await;

    assert_eq!(infra_kind(&run.outcomes[0]), Some(InfrastructureKind::UnresolvedReference));
    assert_eq!(run.outcomes[1].status(), StepStatus::Passed);
    assert_eq!(runner.executor.seen_urls(), vec![BASE.to_string()]);
}

#[tokio::test]
async fn missing_capture_path_is_unresolved_on_use() {
    let runner = runner(vec![ok(201, json!({"_id": 1}))]);
    let scenario = Scenario::new("missing")
        .step(Step::post("create", "/").expect_status(201).capture("fruitId", "__Id"))
        .step(Step::delete("delete", "/fruit/{{fruitId}}").expect_status(200));

    let run = runner.run(&scenario, &mut Collect::default()).await;

    assert!(run.outcomes[0].captures[0].state.is_missing());
    assert_eq!(run.outcomes[0].status(), StepStatus::Passed);
    let infra = run.outcomes[1].infrastructure.as_ref().unwrap();
    assert_eq!(infra.kind, InfrastructureKind::UnresolvedReference);
    assert!(infra.message.contains("fruitId"));
}

#[tokio::test]
async fn transport_failure_is_recorded_and_run_continues() {
    let runner = runner(vec![
        Reply::Fail(ExecutionError::Transport {
            kind: TransportKind::Connect,
            message: "connection refused".to_string(),
        }),
        ok(200, json!([])),
    ]);
    let scenario = Scenario::new("transport")
        .step(Step::get("down", "/").expect_status(200))
        .step(Step::get("up", "/").expect_status(200));

    let run = runner.run(&scenario, &mut Collect::default()).await;

    assert_eq!(infra_kind(&run.outcomes[0]), Some(InfrastructureKind::Transport));
    assert_eq!(run.outcomes[0].url.as_deref(), Some(BASE));
    assert_eq!(run.outcomes[1].status(), StepStatus::Passed);
    assert_eq!(run.summary.error_count, 1);
    assert!(!run.all_passed());
}

#[tokio::test]
async fn failing_reporter_does_not_change_outcomes() {
    let runner = runner(vec![ok(200, json!([]))]);
    let scenario = Scenario::new("quiet").step(Step::get("list", "/").expect_status(200));
    let mut reporter = Collect {
        fail: true,
        ..Collect::default()
    };

    let run = runner.run(&scenario, &mut reporter).await;

    assert!(run.all_passed());
    assert!(*reporter.ended.lock().unwrap());
}

#[tokio::test]
async fn cancel_aborts_in_flight_call_and_skips_the_rest() {
    let runner = runner(vec![Reply::Hang, ok(200, json!([]))]);
    let scenario = Scenario::new("cancel")
        .step(Step::get("slow", "/").expect_status(200))
        .step(Step::get("never", "/").expect_status(200));
    let handle = runner.cancel_handle();
    let mut reporter = Collect::default();

    let (run, delivered) = tokio::join!(runner.run(&scenario, &mut reporter), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel()
    });

    assert!(delivered);
    assert_eq!(infra_kind(&run.outcomes[0]), Some(InfrastructureKind::Timeout));
    assert_eq!(infra_kind(&run.outcomes[1]), Some(InfrastructureKind::Timeout));
    assert_eq!(runner.executor.seen_urls().len(), 1);
}

#[tokio::test]
async fn run_deadline_bounds_the_whole_run() {
    let mut config = RunConfig::new(BASE);
    config.run_deadline_ms = Some(50);
    let runner = ScenarioRunner::new(Scripted::new(vec![Reply::Hang, ok(200, json!([]))]), config);
    let scenario = Scenario::new("deadline")
        .step(Step::get("slow", "/"))
        .step(Step::get("late", "/"));

    let run = runner.run(&scenario, &mut Collect::default()).await;

    for outcome in &run.outcomes {
        assert_eq!(infra_kind(outcome), Some(InfrastructureKind::Timeout));
    }
    assert_eq!(runner.executor.seen_urls().len(), 1);
}

#[tokio::test]
async fn each_run_starts_with_an_empty_store() {
    let runner = runner(vec![ok(201, json!({"_id": 5}))]);
    let capture_only = Scenario::new("one").step(Step::post("create", "/").capture("id", "_id"));
    let uses_capture = Scenario::new("two").step(Step::get("read", "/{{id}}"));

    runner.run(&capture_only, &mut Collect::default()).await;
    let second = runner.run(&uses_capture, &mut Collect::default()).await;

    assert_eq!(
        infra_kind(&second.outcomes[0]),
        Some(InfrastructureKind::UnresolvedReference)
    );
}

#[tokio::test]
async fn environment_variables_resolve_and_headers_merge() {
    let mut config = RunConfig::new(BASE);
    config.variables.insert("tenant".to_string(), json!("acme"));
    config
        .default_headers
        .insert("X-Client".to_string(), "contract-runner".to_string());
    let runner = ScenarioRunner::new(Scripted::new(vec![ok(200, json!([]))]), config);
    let scenario = Scenario::new("env").step(
        Step::get("list", "/{{tenant}}/produtos").header("Authorization", "Bearer {{tenant}}"),
    );

    let run = runner.run(&scenario, &mut Collect::default()).await;

    assert!(run.all_passed());
    let seen = runner.executor.seen.lock().unwrap();
    assert_eq!(seen[0].method, HttpMethod::Get);
    assert_eq!(seen[0].url, format!("{BASE}/acme/produtos"));
    assert_eq!(seen[0].headers["authorization"], "Bearer acme");
    assert_eq!(seen[0].headers["x-client"], "contract-runner");
}

#[tokio::test]
async fn malformed_placeholder_is_never_sent() {
    let runner = runner(vec![ok(201, json!({"_id": 1})), ok(200, json!({}))]);
    let scenario = Scenario::new("typo")
        .step(Step::post("create", "/").expect_status(201).capture("mercadoId", "_id"))
        .step(Step::delete("delete", "/{{mercadoId}/produtos").expect_status(200));

    let run = runner.run(&scenario, &mut Collect::default()).await;

    assert_eq!(infra_kind(&run.outcomes[1]), Some(InfrastructureKind::UnresolvedReference));
    assert_eq!(runner.executor.seen_urls(), vec![BASE.to_string()]);
}

#[tokio::test]
async fn captured_values_stay_inside_their_segment() {
    let runner = runner(vec![
        ok(201, json!({"_id": "1/../../admin?x="})),
        ok(200, json!({})),
    ]);
    let scenario = Scenario::new("escape")
        .step(Step::post("create", "/").capture("id", "_id"))
        .step(Step::get("products", "/{{id}}/produtos"));

    let run = runner.run(&scenario, &mut Collect::default()).await;

    assert!(run.all_passed());
    assert_eq!(
        runner.executor.seen_urls()[1],
        format!("{BASE}/1%2F..%2F..%2Fadmin%3Fx%3D/produtos")
    );
}

#[tokio::test]
async fn null_capture_in_url_is_not_sent() {
    let runner = runner(vec![ok(201, json!({"_id": null})), ok(200, json!({}))]);
    let scenario = Scenario::new("null")
        .step(Step::post("create", "/").capture("id", "_id"))
        .step(Step::get("products", "/{{id}}/produtos"));

    let run = runner.run(&scenario, &mut Collect::default()).await;

    assert_eq!(infra_kind(&run.outcomes[1]), Some(InfrastructureKind::InvalidRequest));
    assert_eq!(run.outcomes[1].url, None);
    assert_eq!(runner.executor.seen_urls().len(), 1);
}
