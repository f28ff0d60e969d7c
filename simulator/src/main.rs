//! Token vault simulator
//!
//! Runs scripted and randomized units of work through the token ledger and
//! reports what was settled, refunded and rejected.

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tokenvault_common::Payment;

mod config;
mod controller;
mod metrics;
mod recipient;
mod scenario;

use config::SimulationConfig;
use controller::{SimulationController, WorkOutcome};
use metrics::SimulationMetrics;
use scenario::Scenario;

/// Token vault simulator CLI
#[derive(Parser, Debug)]
#[command(name = "vault-sim")]
#[command(about = "Run units of work through the token ledger")]
struct Args {
    /// Built-in scenario to run
    #[arg(short, long, conflicts_with = "file")]
    scenario: Option<String>,

    /// Scenario JSON file to run
    #[arg(short, long)]
    file: Option<std::path::PathBuf>,

    /// Number of randomized units of work
    #[arg(short, long)]
    runs: Option<usize>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Worker tasks for randomized runs
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Distinct tokens per randomized unit of work
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Operations per randomized unit of work
    #[arg(long)]
    max_steps: Option<usize>,

    /// List built-in scenarios and exit
    #[arg(long)]
    list: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Print a JSON report to stdout
    #[arg(long)]
    report_json: bool,
}

impl Args {
    fn apply(&self, config: &mut SimulationConfig) {
        if let Some(runs) = self.runs {
            config.runs = runs;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    generated_at: DateTime<Utc>,
    metrics: &'a SimulationMetrics,
    outcomes: &'a [WorkOutcome],
    received: Vec<Payment>,
    refunded: Vec<Payment>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.list {
        for name in Scenario::builtin_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let mut config = SimulationConfig::from_env();
    args.apply(&mut config);

    // Initialize logging; stdout is reserved for the report
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let (plain, json) = if args.log_json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    info!("Starting token vault simulator");

    let mut controller = SimulationController::new(config);

    let outcomes = if let Some(name) = &args.scenario {
        let scenario = Scenario::load(name)?;
        vec![controller.run_scenario(&scenario).await?]
    } else if let Some(path) = &args.file {
        let scenario = Scenario::from_file(path)?;
        vec![controller.run_scenario(&scenario).await?]
    } else {
        controller.run_random().await?
    };

    let metrics = controller.metrics().await;
    let recipient = controller.recipient();

    info!(
        units_of_work = metrics.units_of_work,
        committed = metrics.committed,
        aborted = metrics.aborted,
        operations = metrics.operations_applied,
        expected_failures = metrics.expected_failures,
        payments_settled = metrics.payments_settled,
        transfers = recipient.transfers(),
        refunds = recipient.refunds(),
        commit_rate = metrics.commit_rate(),
        avg_us = metrics.average_duration_us(),
        p99_us = metrics.p99_duration_us(),
        "Simulation complete"
    );

    if args.report_json {
        let report = Report {
            generated_at: Utc::now(),
            metrics: &metrics,
            outcomes: &outcomes,
            received: recipient.received_totals(),
            refunded: recipient.refunded_totals(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if metrics.unreconciled > 0 {
        anyhow::bail!("{} units of work failed reconciliation", metrics.unreconciled);
    }

    Ok(())
}
