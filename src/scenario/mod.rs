//! # Scenarios
//!
//! A scenario is an ordered list of steps. Each step declares one request,
//! what the response must look like, and which values to capture for later
//! steps. Declarations are plain values: every builder method consumes the
//! step and returns a new one.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::assertion::Expectation;
use crate::error::ScenarioError;
use crate::http::request::RequestTemplate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSpec {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    name: String,
    request: RequestTemplate,
    expectations: Vec<Expectation>,
    captures: Vec<CaptureSpec>,
}

impl Step {
    pub fn new(name: impl Into<String>, request: RequestTemplate) -> Self {
        Self {
            name: name.into(),
            request,
            expectations: Vec::new(),
            captures: Vec::new(),
        }
    }

    pub fn get(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, RequestTemplate::get(url))
    }

    pub fn post(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, RequestTemplate::post(url))
    }

    pub fn put(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, RequestTemplate::put(url))
    }

    pub fn patch(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, RequestTemplate::patch(url))
    }

    pub fn delete(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, RequestTemplate::delete(url))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request = self.request.header(name, value);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.request = self.request.json(body);
        self
    }

    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }

    pub fn expect_status(self, status: u16) -> Self {
        self.expect(Expectation::StatusEquals { status })
    }

    pub fn expect_body_contains(self, subset: Value) -> Self {
        self.expect(Expectation::BodyContains { subset })
    }

    pub fn expect_schema(self, schema: Value) -> Self {
        self.expect(Expectation::BodySchemaMatches { schema })
    }

    pub fn expect_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.expect(Expectation::HeaderEquals {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn expect_path(self, path: impl Into<String>, value: Value) -> Self {
        self.expect(Expectation::PathEquals {
            path: path.into(),
            value,
        })
    }

    pub fn expect_response_time_below(self, millis: u64) -> Self {
        self.expect(Expectation::ResponseTimeBelow { millis })
    }

    /// Store the value at `path` of a passing response as `{{name}}`.
    pub fn capture(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.captures.push(CaptureSpec {
            name: name.into(),
            path: path.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request(&self) -> &RequestTemplate {
        &self.request
    }

    pub fn expectations(&self) -> &[Expectation] {
        &self.expectations
    }

    pub fn captures(&self) -> &[CaptureSpec] {
        &self.captures
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    name: String,
    steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Authoring checks that need no network: duplicate step names,
    /// malformed placeholders, and references to names that only a later
    /// step (or no step) captures.
    /// `variables` are environment names that are always resolvable.
    pub fn validate(&self, variables: &HashMap<String, Value>) -> Result<(), Vec<ScenarioError>> {
        let mut errors = Vec::new();
        if self.steps.is_empty() {
            errors.push(ScenarioError::EmptyScenario);
        }

        let mut seen_names = HashSet::new();
        for step in &self.steps {
            if !seen_names.insert(step.name.as_str()) {
                errors.push(ScenarioError::DuplicateStepName(step.name.clone()));
            }
        }

        let mut available: HashSet<&str> = variables.keys().map(String::as_str).collect();
        for (idx, step) in self.steps.iter().enumerate() {
            for fragment in step.request.malformed_placeholders() {
                errors.push(ScenarioError::MalformedPlaceholder {
                    step: step.name.clone(),
                    fragment,
                });
            }
            let mut reported = HashSet::new();
            for name in step.request.references() {
                if available.contains(name.as_str()) || !reported.insert(name.clone()) {
                    continue;
                }
                let later = self.steps[idx..]
                    .iter()
                    .find(|candidate| candidate.captures.iter().any(|c| c.name == name));
                errors.push(match later {
                    Some(captured_by) => ScenarioError::ForwardReference {
                        step: step.name.clone(),
                        name,
                        captured_by: captured_by.name.clone(),
                    },
                    None => ScenarioError::UndeclaredReference {
                        step: step.name.clone(),
                        name,
                    },
                });
            }
            for capture in &step.captures {
                available.insert(capture.name.as_str());
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
