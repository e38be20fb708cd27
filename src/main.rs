use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use contract_runner::cli::Cli;
use contract_runner::data::RandomData;
use contract_runner::scenarios::mercado_scenario;
use contract_runner::ScenarioRunner;

const EXIT_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = match cli.run_config() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let seed = cli.seed.unwrap_or_else(rand::random);
    info!(seed, "generating payloads");
    let scenario = mercado_scenario(&mut RandomData::seeded(seed));
    if let Err(errors) = scenario.validate(&config.variables) {
        for err in errors {
            error!(error = %err, "scenario rejected");
        }
        return ExitCode::from(EXIT_CONFIG);
    }

    let mut reporter = match cli.reporter() {
        Ok(reporter) => reporter,
        Err(err) => {
            error!(error = %err, "could not open report sink");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let runner = match ScenarioRunner::from_config(config) {
        Ok(runner) => runner,
        Err(err) => {
            error!(error = %err, "could not build HTTP client");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let run = runner.run(&scenario, &mut reporter).await;
    if run.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILED)
    }
}
