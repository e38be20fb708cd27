//! Full market scenario against an in-process fake of the market service.

use std::collections::HashSet;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{Map, Value, json};
use tiny_http::{Header, Method, Request, Response, Server};

use contract_runner::assertion::InfrastructureKind;
use contract_runner::data::RandomData;
use contract_runner::report::{ConsoleReporter, OutputFormat};
use contract_runner::scenarios::mercado_scenario;
use contract_runner::{RunConfig, ScenarioRun, ScenarioRunner, StepStatus};

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    url: String,
    content_type: Option<String>,
    body: String,
}

/// Answers the routes the scenario uses. Deleted markets keep accepting
/// updates and products, matching the expectations the scenario declares.
struct FakeMarket {
    product_id_key: &'static str,
    markets: HashSet<u64>,
    next_id: u64,
}

impl FakeMarket {
    fn route(&mut self, method: &Method, path: &str, body: &Value) -> (u16, Value) {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match (method, segments.as_slice()) {
            (Method::Post, ["mercado"]) => {
                if !valid_cnpj(&body["cnpj"]) {
                    return (400, json!({"message": "cnpj inválido"}));
                }
                self.next_id += 1;
                self.markets.insert(self.next_id);
                (201, json!({"_id": self.next_id, "nome": body["nome"]}))
            }
            (Method::Get, ["mercado"]) => (200, json!([])),
            (Method::Delete, ["mercado", id]) => match self.market(id) {
                Some(_) => (200, json!({"message": "removido"})),
                None => (404, json!({"message": "não encontrado"})),
            },
            (Method::Put, ["mercado", _id]) => {
                let invalid = body.as_array().is_some_and(|items| {
                    items
                        .iter()
                        .any(|item| item.get("cnpj").is_some_and(|cnpj| !valid_cnpj(cnpj)))
                });
                if invalid {
                    (400, json!({"message": "dados inválidos"}))
                } else {
                    (200, json!({}))
                }
            }
            (Method::Post, ["mercado", id, "produtos", _, _]) => match self.market(id) {
                Some(_) => {
                    self.next_id += 1;
                    let mut created = Map::new();
                    created.insert(self.product_id_key.to_string(), json!(self.next_id));
                    (201, Value::Object(created))
                }
                None => (404, json!({"message": "mercado não encontrado"})),
            },
            (Method::Delete, ["mercado", _, "produtos", _, _, _]) => (200, json!({})),
            (Method::Get, ["mercado", id, "produtos", _, _]) => match self.market(id) {
                Some(_) => (200, json!([])),
                None => (404, json!({"message": "mercado não encontrado"})),
            },
            _ => (405, json!({})),
        }
    }

    fn market(&self, id: &str) -> Option<u64> {
        id.parse().ok().filter(|id| self.markets.contains(id))
    }
}

fn valid_cnpj(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.len() == 14 && s.chars().all(|c| c.is_ascii_digit()))
}

fn respond(mut request: Request, fake: &mut FakeMarket, seen: &Mutex<Vec<Seen>>) {
    let mut raw = String::new();
    let _ = request.as_reader().read_to_string(&mut raw);
    let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
    let content_type = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_string());
    seen.lock().unwrap().push(Seen {
        method: request.method().to_string(),
        url: request.url().to_string(),
        content_type,
        body: raw,
    });

    let (status, payload) = fake.route(request.method(), request.url(), &body);
    let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
    let response = Response::from_string(payload.to_string())
        .with_status_code(status)
        .with_header(header);
    let _ = request.respond(response);
}

async fn run_against_fake(product_id_key: &'static str) -> (ScenarioRun, Vec<Seen>, String) {
    let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
    let addr = server.server_addr().to_ip().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handle = {
        let server = Arc::clone(&server);
        let seen = Arc::clone(&seen);
        thread::spawn(move || {
            let mut fake = FakeMarket {
                product_id_key,
                markets: HashSet::new(),
                next_id: 0,
            };
            for request in server.incoming_requests() {
                respond(request, &mut fake, &seen);
            }
        })
    };

    let mut config = RunConfig::new(format!("http://{addr}/mercado"));
    config.timeout_ms = 5_000;
    let runner = ScenarioRunner::from_config(config).unwrap();
    let scenario = mercado_scenario(&mut RandomData::seeded(2024));
    let mut console = ConsoleReporter::new(Vec::new(), OutputFormat::Text);
    let run = runner.run(&scenario, &mut console).await;

    server.unblock();
    handle.join().unwrap();
    let seen = seen.lock().unwrap().clone();
    let text = String::from_utf8(console.into_inner()).unwrap();
    (run, seen, text)
}

#[tokio::test]
async fn scenario_against_service_without_double_underscore_id() {
    let (run, seen, text) = run_against_fake("_id").await;

    assert_eq!(run.outcomes.len(), 16);
    assert_eq!(run.summary.passed_count, 15);
    assert_eq!(run.summary.failed_count, 0);
    assert_eq!(run.summary.error_count, 1);
    assert!(!run.all_passed());

    let fruit_delete = &run.outcomes[9];
    assert_eq!(fruit_delete.step_name, "delete fruit");
    assert_eq!(fruit_delete.status(), StepStatus::Error);
    assert_eq!(
        fruit_delete.infrastructure.as_ref().map(|i| i.kind),
        Some(InfrastructureKind::UnresolvedReference)
    );
    assert!(run.outcomes[7].captures[0].state.is_missing());

    // The unresolvable step never reached the wire.
    assert_eq!(seen.len(), 15);
    assert!(text.contains("  ERROR delete fruit"));
    assert!(text.contains("15 passed, 0 failed, 1 errors in "));
}

#[tokio::test]
async fn scenario_passes_when_service_returns_double_underscore_id() {
    let (run, seen, _) = run_against_fake("__Id").await;

    assert!(run.all_passed(), "{:#?}", run.outcomes);
    assert_eq!(seen.len(), 16);

    let market_id = run.outcomes[0].captures[0].state.as_value().cloned().unwrap();
    assert_eq!(seen[3].method, "DELETE");
    assert_eq!(seen[3].url, format!("/mercado/{market_id}"));
    let fruit_id = run.outcomes[7].captures[0].state.as_value().cloned().unwrap();
    assert_eq!(seen[9].url, format!("/mercado/{market_id}/produtos/hortifuit/frutas/{fruit_id}"));
}

#[tokio::test]
async fn requests_carry_json_bodies_except_get() {
    let (_, seen, _) = run_against_fake("__Id").await;

    let create = &seen[0];
    assert_eq!(create.method, "POST");
    assert_eq!(create.content_type.as_deref(), Some("application/json"));
    let body: Value = serde_json::from_str(&create.body).unwrap();
    assert_eq!(body["cnpj"].as_str().map(str::len), Some(14));

    let list = &seen[2];
    assert_eq!(list.method, "GET");
    assert!(list.body.is_empty());
    assert_eq!(list.content_type, None);
}
