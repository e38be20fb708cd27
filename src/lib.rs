//! Declarative, stateful HTTP contract testing.
//!
//! A [`Scenario`] is an ordered list of [`Step`]s. The [`ScenarioRunner`]
//! sends each step's request, checks its expectations, stores declared
//! captures for later steps and streams every outcome to a [`Reporter`].

pub mod assertion;
pub mod capture;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod http;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod scenarios;

pub use assertion::{Expectation, StepOutcome, StepStatus};
pub use capture::CaptureStore;
pub use config::RunConfig;
pub use http::client::{Executor, HttpClient};
pub use report::Reporter;
pub use runner::{CancelHandle, ScenarioRun, ScenarioRunner};
pub use scenario::{Scenario, Step};
